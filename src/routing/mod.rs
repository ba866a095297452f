//! Route table, path patterns and route handlers.

mod handler;
mod pattern;
mod router;

pub use handler::{Handler, HandlerFuture, Reply, RequestHandler};
pub use pattern::{ParamValue, Params, Pattern};
pub use router::{Route, RouteMatch, Router};
