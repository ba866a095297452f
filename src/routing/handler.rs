use crate::di::{Container, Injectable, downcast_trait, identifier_of};
use crate::error::{Result, TrellisError};
use crate::http::{Request, Response};
use crate::routing::Params;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by closure handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Reply>> + Send>>;

type HandlerFn = Arc<dyn Fn(Request, Params) -> HandlerFuture + Send + Sync>;
type ServiceFn = Arc<dyn Fn(&Container) -> Result<Arc<dyn RequestHandler>> + Send + Sync>;

/// What a handler hands back before normalization.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Returned unchanged.
    Response(Response),
    /// Objects and arrays become JSON responses and strings become HTML.
    /// Numbers, booleans and `null` are rejected.
    Json(Value),
    /// Wrapped into an HTML response.
    Html(String),
}

impl Reply {
    pub fn json<T: Serialize>(data: &T) -> serde_json::Result<Self> {
        Ok(Self::Json(serde_json::to_value(data)?))
    }

    /// Normalize into a [`Response`].
    pub fn into_response(self) -> Result<Response> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Json(value @ (Value::Object(_) | Value::Array(_))) => Ok(Response::json(value)),
            Self::Json(Value::String(content)) => Ok(Response::html(content)),
            Self::Json(other) => Err(TrellisError::InvalidHandlerResult {
                found: json_kind(&other).to_string(),
            }),
            Self::Html(content) => Ok(Response::html(content)),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Reply {
    fn from(content: String) -> Self {
        Self::Html(content)
    }
}

impl From<&str> for Reply {
    fn from(content: &str) -> Self {
        Self::Html(content.to_string())
    }
}

/// Capability implemented by handler types resolved from the container.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request, params: Params) -> anyhow::Result<Reply>;
}

/// The target of a route.
#[derive(Clone)]
pub enum Handler {
    /// A closure receiving the request and the extracted parameters.
    Callable(HandlerFn),
    /// A [`RequestHandler`] obtained from the container at dispatch time.
    Service {
        identifier: String,
        resolve: ServiceFn,
    },
}

impl Handler {
    pub fn from_fn<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Reply> + 'static,
    {
        Self::Callable(Arc::new(
            move |request: Request, params: Params| -> HandlerFuture {
                let future = handler(request, params);
                Box::pin(async move { future.await.map(Into::into) })
            },
        ))
    }

    /// A handler type built by the container (fresh per dispatch unless bound as a singleton).
    pub fn service<H: RequestHandler + Injectable>() -> Self {
        Self::Service {
            identifier: identifier_of::<H>().to_string(),
            resolve: Arc::new(|container: &Container| {
                container
                    .resolve::<H>()
                    .map(|handler| handler as Arc<dyn RequestHandler>)
            }),
        }
    }

    /// A handler bound in the container under `identifier` as an `Arc<dyn RequestHandler>`.
    pub fn service_id(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let target = identifier.clone();
        Self::Service {
            identifier,
            resolve: Arc::new(move |container: &Container| {
                let instance = container.resolve_id(&target)?;
                downcast_trait::<dyn RequestHandler>(instance).map_err(|_| {
                    TrellisError::InvalidHandler {
                        identifier: target.clone(),
                    }
                })
            }),
        }
    }

    pub(crate) async fn invoke(
        &self,
        container: &Container,
        request: Request,
        params: Params,
    ) -> Result<Response> {
        let reply = match self {
            Self::Callable(handler) => handler(request, params).await,
            Self::Service { resolve, .. } => {
                let handler = resolve(container)?;
                handler.handle(request, params).await
            }
        };
        reply.map_err(TrellisError::from_handler)?.into_response()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Handler::Callable"),
            Self::Service { identifier, .. } => write!(f, "Handler::Service({identifier})"),
        }
    }
}
