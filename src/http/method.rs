use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// HTTP request methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Compares against a raw request method, ignoring case.
    pub fn matches(&self, method: &str) -> bool {
        self.as_ref().eq_ignore_ascii_case(method)
    }
}
