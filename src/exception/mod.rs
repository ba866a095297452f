use crate::error::TrellisError;
use crate::http::Response;

mod json;

pub use json::JsonExceptionFilter;

/// Turns a faulted dispatch into the response sent to the client.
///
/// Filters must always produce a response.
pub trait ExceptionFilter: Send + Sync + 'static {
    fn catch(&self, error: &TrellisError) -> Response;
}
