//! Request and response values exchanged with the transport boundary.

mod method;
mod request;
mod response;

pub use method::Method;
pub use request::Request;
pub use response::{Body, Response};
