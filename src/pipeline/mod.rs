//! Middleware pipeline composed per dispatch.

mod dispatcher;

pub use dispatcher::Dispatcher;

use crate::di::{Container, Injectable, Lifecycle, downcast_trait};
use crate::error::Result;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future produced by the end of the chain.
pub type PipelineFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

type Terminal = Box<dyn FnOnce(Request) -> PipelineFuture + Send>;

/// A stage wrapping the rest of the chain.
///
/// A middleware may call `next.run(request)` (optionally with a replaced
/// request, optionally adjusting the returned response), or return a response
/// directly, in which case nothing after it runs.
///
/// # Example
/// ```
/// use trellis::http::{Request, Response};
/// use trellis::pipeline::{Middleware, Next};
/// use trellis::Result;
/// use async_trait::async_trait;
///
/// struct PoweredBy;
///
/// #[async_trait]
/// impl Middleware for PoweredBy {
///     async fn process(&self, request: Request, next: Next) -> Result<Response> {
///         let response = next.run(request).await?;
///         Ok(response.with_header("X-Powered-By", "trellis"))
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn process(&self, request: Request, next: Next) -> Result<Response>;
}

struct Stage {
    identifier: String,
    middleware: Arc<dyn Middleware>,
}

/// The remainder of the chain: the stages not yet entered plus the terminal.
pub struct Next {
    stages: VecDeque<Stage>,
    terminal: Terminal,
}

impl Next {
    /// A chain with no middleware in front of `terminal`.
    pub fn new<F>(terminal: F) -> Self
    where
        F: FnOnce(Request) -> PipelineFuture + Send + 'static,
    {
        Self {
            stages: VecDeque::new(),
            terminal: Box::new(terminal),
        }
    }

    /// Append a stage in front of the terminal, after the stages already present.
    pub fn wrap(mut self, identifier: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.stages.push_back(Stage {
            identifier: identifier.into(),
            middleware,
        });
        self
    }

    /// Number of middleware stages still ahead of the terminal.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }

    /// Continue with the next stage, or the terminal when none are left.
    pub async fn run(mut self, request: Request) -> Result<Response> {
        match self.stages.pop_front() {
            Some(stage) => {
                tracing::trace!(
                    middleware = %stage.identifier,
                    remaining = self.stages.len(),
                    "Entering middleware"
                );
                stage.middleware.process(request, self).await
            }
            None => {
                tracing::trace!("Middleware chain complete, calling handler");
                (self.terminal)(request).await
            }
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field(
                "stages",
                &self.stages.iter().map(|stage| &stage.identifier).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Resolve each middleware from the container, in order, and compose them in
/// front of `terminal`.
///
/// # Errors
/// Fails with the resolution error of the first identifier that cannot be
/// resolved, or `DowncastFailed` when the instance is not a middleware.
pub fn build_chain<I, F>(container: &Container, identifiers: I, terminal: F) -> Result<Next>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    F: FnOnce(Request) -> PipelineFuture + Send + 'static,
{
    let mut next = Next::new(terminal);
    for identifier in identifiers {
        let identifier = identifier.as_ref();
        let middleware = downcast_trait::<dyn Middleware>(container.resolve_id(identifier)?)?;
        next = next.wrap(identifier, middleware);
    }
    tracing::debug!(stages = next.remaining(), "Pipeline built");
    Ok(next)
}

impl Container {
    /// Register middleware type `M` under `identifier`.
    pub fn middleware<M: Middleware + Injectable>(
        &mut self,
        identifier: impl Into<String>,
        lifecycle: Lifecycle,
    ) -> &mut Self {
        self.bind_trait_as::<dyn Middleware, M, _>(
            identifier,
            |middleware| middleware as Arc<dyn Middleware>,
            lifecycle,
        )
    }

    /// Register a ready-made middleware value under `identifier`.
    pub fn middleware_instance<M: Middleware>(
        &mut self,
        identifier: impl Into<String>,
        middleware: M,
    ) -> &mut Self {
        self.instance(identifier, Arc::new(middleware) as Arc<dyn Middleware>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Arguments;
    use crate::error::TrellisError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Record {
        label: &'static str,
        journal: Journal,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn process(&self, request: Request, next: Next) -> Result<Response> {
            self.journal.lock().unwrap().push(format!("{} in", self.label));
            let response = next.run(request).await;
            self.journal.lock().unwrap().push(format!("{} out", self.label));
            response
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn process(&self, _request: Request, _next: Next) -> Result<Response> {
            Ok(Response::text("denied").with_status(403))
        }
    }

    impl Injectable for Deny {
        fn construct(_args: Arguments) -> Result<Self> {
            Ok(Deny)
        }
    }

    struct Rewrite;

    #[async_trait]
    impl Middleware for Rewrite {
        async fn process(&self, request: Request, next: Next) -> Result<Response> {
            let replaced = Request::get("/rewritten").with_header("X-Original", request.path());
            let response = next.run(replaced).await?;
            Ok(response.with_header("X-Rewritten", "yes"))
        }
    }

    fn echo_path(calls: Arc<AtomicUsize>) -> impl FnOnce(Request) -> PipelineFuture + Send + 'static {
        move |request: Request| -> PipelineFuture {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let original = request.header("X-Original").unwrap_or("-").to_string();
                Ok(Response::text(format!("{} {}", request.path(), original)))
            })
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_declared_order() {
        let journal: Journal = Arc::default();
        let mut container = Container::new();
        container
            .middleware_instance("first", Record { label: "first", journal: journal.clone() })
            .middleware_instance("second", Record { label: "second", journal: journal.clone() });

        let calls = Arc::new(AtomicUsize::new(0));
        let chain = build_chain(&container, ["first", "second"], echo_path(calls.clone())).unwrap();
        assert_eq!(chain.remaining(), 2);

        let response = chain.run(Request::get("/x")).await.unwrap();
        assert_eq!(response.body_string(), "/x -");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *journal.lock().unwrap(),
            ["first in", "second in", "second out", "first out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest_of_chain() {
        let journal: Journal = Arc::default();
        let mut container = Container::new();
        container
            .middleware::<Deny>("deny", Lifecycle::Transient)
            .middleware_instance("after", Record { label: "after", journal: journal.clone() });

        let calls = Arc::new(AtomicUsize::new(0));
        let response = build_chain(&container, ["deny", "after"], echo_path(calls.clone()))
            .unwrap()
            .run(Request::get("/secret"))
            .await
            .unwrap();

        assert_eq!(response.status(), 403);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_middleware_can_replace_request_and_adjust_response() {
        let mut container = Container::new();
        container.middleware_instance("rewrite", Rewrite);

        let calls = Arc::new(AtomicUsize::new(0));
        let response = build_chain(&container, ["rewrite"], echo_path(calls))
            .unwrap()
            .run(Request::get("/original"))
            .await
            .unwrap();

        assert_eq!(response.body_string(), "/rewritten /original");
        assert_eq!(response.header("X-Rewritten"), Some("yes"));
    }

    #[tokio::test]
    async fn test_unbound_middleware_fails_to_build() {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let err = build_chain(&container, ["missing"], echo_path(calls)).unwrap_err();
        assert!(matches!(err, TrellisError::NotFound { ref identifier, .. } if identifier == "missing"));
    }

    #[tokio::test]
    async fn test_non_middleware_binding_is_rejected() {
        let mut container = Container::new();
        container.instance("number", 7u32);
        let calls = Arc::new(AtomicUsize::new(0));
        let err = build_chain(&container, ["number"], echo_path(calls)).unwrap_err();
        assert!(matches!(err, TrellisError::DowncastFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_chain_calls_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = build_chain(&Container::new(), Vec::<String>::new(), echo_path(calls.clone()))
            .unwrap()
            .run(Request::get("/bare"))
            .await
            .unwrap();
        assert_eq!(response.body_string(), "/bare -");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
