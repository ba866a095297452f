use crate::di::Container;
use crate::error::Result;
use crate::events::{DispatchEvent, EventBus};
use crate::http::{Request, Response};
use crate::pipeline::{PipelineFuture, build_chain};
use crate::routing::{RouteMatch, Router};
use std::sync::Arc;

/// Matches a request, runs its pipeline and normalizes the handler's result.
///
/// The container and router are shared read-only between concurrent dispatches.
#[derive(Clone)]
pub struct Dispatcher {
    container: Arc<Container>,
    router: Arc<Router>,
    events: Option<EventBus>,
}

impl Dispatcher {
    pub fn new(container: Arc<Container>, router: Arc<Router>) -> Self {
        Self {
            container,
            router,
            events: None,
        }
    }

    /// Publish a [`DispatchEvent`] for every request.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Dispatch one request.
    ///
    /// An unmatched request yields a 404 response without running any
    /// middleware. Resolution, middleware and handler failures are returned
    /// unchanged.
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        let method = request.method().to_string();
        let path = request.path().to_string();

        let Some(RouteMatch { route, params }) = self.router.find(&method, &path) else {
            tracing::debug!(%method, %path, "No route matched");
            self.publish(|| DispatchEvent::NotFound {
                method: method.clone(),
                path: path.clone(),
            });
            return Ok(Response::not_found());
        };

        tracing::debug!(
            %method,
            %path,
            pattern = route.pattern().as_str(),
            params = params.len(),
            "Route matched"
        );
        self.publish(|| DispatchEvent::Matched {
            method: method.clone(),
            path: path.clone(),
            pattern: route.pattern().as_str().to_string(),
        });

        let handler = route.handler().clone();
        let container = Arc::clone(&self.container);
        let terminal = move |request: Request| -> PipelineFuture {
            Box::pin(async move { handler.invoke(&container, request, params).await })
        };

        let identifiers = self
            .router
            .global_middleware()
            .iter()
            .chain(route.middleware_ids());
        let result = match build_chain(&self.container, identifiers, terminal) {
            Ok(chain) => chain.run(request).await,
            Err(err) => Err(err),
        };

        match &result {
            Ok(response) => {
                tracing::debug!(%method, %path, status = response.status(), "Request dispatched");
                self.publish(|| DispatchEvent::Completed {
                    method: method.clone(),
                    path: path.clone(),
                    status: response.status(),
                });
            }
            Err(err) => {
                tracing::debug!(%method, %path, kind = err.kind(), error = %err, "Dispatch faulted");
                self.publish(|| DispatchEvent::Failed {
                    method: method.clone(),
                    path: path.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
        result
    }

    fn publish(&self, event: impl FnOnce() -> DispatchEvent) {
        if let Some(events) = &self.events {
            events.publish(event());
        }
    }
}
