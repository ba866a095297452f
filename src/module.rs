use crate::di::Container;
use crate::error::Result;
use crate::routing::Router;

/// A unit of application wiring: bindings plus the routes that use them.
///
/// # Example
/// ```
/// use trellis::di::Container;
/// use trellis::routing::{Handler, Router};
/// use trellis::{Module, Result};
///
/// struct HealthModule;
///
/// impl Module for HealthModule {
///     fn register(&self, container: &mut Container, router: &mut Router) -> Result<()> {
///         container.instance("health.status", String::from("ok"));
///         router.get("/health", Handler::from_fn(|_request, _params| async move {
///             anyhow::Ok("ok")
///         }))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    /// Register all bindings and routes of this module.
    fn register(&self, container: &mut Container, router: &mut Router) -> Result<()>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
