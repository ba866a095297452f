use crate::application::Application;
use crate::http::{Request, Response};
use axum::body::Body;
use axum::response::IntoResponse;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::Service;

/// Default cap on collected request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Adapts an [`Application`] to `tower::Service`, so it can be mounted on an
/// axum router or served by any tower-compatible server.
///
/// Every request produces a response: faults go through the application's
/// exception filter. Bodies over the limit and non-UTF-8 bodies or header
/// values become `400`.
#[derive(Clone)]
pub struct DispatchService {
    app: Application,
    body_limit: usize,
}

impl DispatchService {
    pub fn new(app: Application) -> Self {
        Self {
            app,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Service<axum::http::Request<Body>> for DispatchService {
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: axum::http::Request<Body>) -> Self::Future {
        let app = self.app.clone();
        let limit = self.body_limit;
        Box::pin(async move {
            let response = match Request::from_http(request, limit).await {
                Ok(request) => app.handle(request).await,
                Err(err) => {
                    tracing::debug!(error = %err, "Rejecting unreadable request");
                    Response::text("Bad Request").with_status(400)
                }
            };
            Ok(response.into_response())
        })
    }
}
