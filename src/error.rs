use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrellisError>;

#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("No entry was found for `{identifier}` (while resolving {})", render_chain(.chain))]
    NotFound {
        identifier: String,
        chain: Vec<String>,
    },

    #[error("Circular dependency detected: {}", render_chain(.chain))]
    CyclicDependency { chain: Vec<String> },

    #[error(
        "Unable to resolve parameter `{parameter}` of `{identifier}` (while resolving {})",
        render_chain(.chain)
    )]
    UnresolvableParameter {
        identifier: String,
        parameter: String,
        chain: Vec<String>,
    },

    #[error("Failed to construct `{identifier}`: {reason}")]
    ConstructionFailure {
        identifier: String,
        reason: String,
        chain: Vec<String>,
    },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid route handler: `{identifier}` does not implement RequestHandler")]
    InvalidHandler { identifier: String },

    #[error("Invalid handler result: expected a response, a JSON object or array, or an HTML string, got {found}")]
    InvalidHandlerResult { found: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Handler(anyhow::Error),
}

impl TrellisError {
    /// Shorthand for a construction failure raised from inside an `Injectable::construct`.
    pub fn construction(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self::ConstructionFailure {
            chain: vec![identifier.clone()],
            identifier,
            reason: reason.into(),
        }
    }

    /// Converts an error raised by a handler body.
    ///
    /// Classified errors that travelled through `anyhow` come back out unchanged;
    /// everything else is wrapped as [`TrellisError::Handler`].
    pub fn from_handler(error: anyhow::Error) -> Self {
        error.downcast::<TrellisError>().unwrap_or_else(Self::Handler)
    }

    /// Stable label for the error kind, used when rendering faults.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::CyclicDependency { .. } => "cyclic_dependency",
            Self::UnresolvableParameter { .. } => "unresolvable_parameter",
            Self::ConstructionFailure { .. } => "construction_failure",
            Self::DowncastFailed { .. } => "downcast_failed",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::InvalidHandler { .. } => "invalid_handler",
            Self::InvalidHandlerResult { .. } => "invalid_handler_result",
            Self::Config(_) => "config",
            Self::Handler(_) => "handler",
        }
    }

    /// The identifier chain that was being resolved, if this is a resolution error.
    pub fn chain(&self) -> Option<&[String]> {
        match self {
            Self::NotFound { chain, .. }
            | Self::CyclicDependency { chain }
            | Self::UnresolvableParameter { chain, .. }
            | Self::ConstructionFailure { chain, .. } => Some(chain),
            _ => None,
        }
    }
}

fn render_chain(chain: &[String]) -> String {
    chain.join(" -> ")
}
