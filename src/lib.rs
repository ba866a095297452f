//! # Trellis
//!
//! A small web-application core: a dependency injection container that builds
//! object graphs from declared constructor parameters, and a router that runs
//! matched requests through an ordered middleware pipeline before invoking a
//! handler.
//!
//! ## Features
//!
//! - **Dependency Injection**: transient and singleton bindings, factories,
//!   aliases, trait-object services, named overrides, defaults and cycle detection
//! - **Routing**: `{name}` path templates, first-registered-wins matching,
//!   integer coercion of numeric segments
//! - **Middleware**: container-resolved `process(request, next)` stages,
//!   global before route-specific
//! - **Boundary**: JSON exception rendering, dispatch events and a
//!   `tower::Service` adapter for axum
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Injectable)]
//! struct Greeter {
//!     #[inject(default = "String::from(\"hello\")")]
//!     greeting: String,
//! }
//!
//! #[async_trait]
//! impl RequestHandler for Greeter {
//!     async fn handle(&self, _request: Request, params: Params) -> anyhow::Result<Reply> {
//!         Ok(json!({ "message": format!("{} {}", self.greeting, params[0]) }).into())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> trellis::Result<()> {
//! let mut builder = Application::builder();
//! builder.router_mut().get("/greet/{name}", Handler::service::<Greeter>())?;
//! let app = builder.build()?;
//!
//! let response = app.dispatch(Request::get("/greet/world")).await?;
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body_string(), r#"{"message":"hello world"}"#);
//! # Ok(())
//! # }
//! ```

extern crate self as trellis;

pub mod application;
pub mod config;
pub mod di;
pub mod error;
pub mod events;
pub mod exception;
pub mod http;
pub mod module;
pub mod pipeline;
pub mod routing;
pub mod service;

// Re-export core types
pub use application::{Application, ApplicationBuilder};
pub use config::Config;
pub use di::{Container, ContainerBuilder, Injectable, Lifecycle};
pub use error::{Result, TrellisError};
pub use module::Module;

// Derive macro, sharing the trait's name
pub use trellis_macro::Injectable;

pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::application::{Application, ApplicationBuilder};
    pub use crate::config::Config;
    pub use crate::di::{
        Arguments, Concrete, Container, ContainerBuilder, Injectable, Lifecycle, Overrides,
        Parameter,
    };
    pub use crate::error::{Result, TrellisError};
    pub use crate::events::{DispatchEvent, EventBus};
    pub use crate::exception::{ExceptionFilter, JsonExceptionFilter};
    pub use crate::http::{Method, Request, Response};
    pub use crate::module::Module;
    pub use crate::pipeline::{Middleware, Next};
    pub use crate::routing::{Handler, Params, Reply, RequestHandler, Router};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use trellis_macro::Injectable;
}
