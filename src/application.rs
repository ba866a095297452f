//! Application bootstrap.
//!
//! Wires configuration, modules, the event bus and an exception filter into a
//! frozen container and router, then dispatches requests against them.

use crate::config::Config;
use crate::di::Container;
use crate::error::Result;
use crate::events::EventBus;
use crate::exception::{ExceptionFilter, JsonExceptionFilter};
use crate::http::{Request, Response};
use crate::module::Module;
use crate::pipeline::Dispatcher;
use crate::routing::Router;
use crate::service::DispatchService;
use std::sync::Arc;

/// A built application. Cheap to clone.
///
/// # Example
/// ```
/// use trellis::http::Request;
/// use trellis::routing::Handler;
/// use trellis::Application;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut builder = Application::builder();
/// builder
///     .router_mut()
///     .get("/ping", Handler::from_fn(|_request, _params| async move { anyhow::Ok("pong") }))
///     .unwrap();
/// let app = builder.build().unwrap();
///
/// let response = app.handle(Request::get("/ping")).await;
/// assert_eq!(response.body_string(), "pong");
/// # }
/// ```
#[derive(Clone)]
pub struct Application {
    config: Arc<Config>,
    dispatcher: Dispatcher,
    events: EventBus,
    filter: Arc<dyn ExceptionFilter>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn container(&self) -> &Arc<Container> {
        self.dispatcher.container()
    }

    pub fn router(&self) -> &Arc<Router> {
        self.dispatcher.router()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch a request, returning classified faults to the caller.
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        self.dispatcher.dispatch(request).await
    }

    /// Dispatch a request, rendering any fault through the exception filter.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatcher.dispatch(request).await {
            Ok(response) => response,
            Err(err) => self.filter.catch(&err),
        }
    }

    /// A `tower::Service` over axum requests.
    pub fn into_service(self) -> DispatchService {
        DispatchService::new(self)
    }
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    config: Config,
    container: Container,
    router: Router,
    events: EventBus,
    filter: Option<Arc<dyn ExceptionFilter>>,
    modules: Vec<Box<dyn Module>>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
            container: Container::new(),
            router: Router::new(),
            events: EventBus::new(),
            filter: None,
            modules: Vec::new(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Modules register in the order they are added.
    pub fn module(mut self, module: impl Module) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Replace the default [`JsonExceptionFilter`].
    pub fn exception_filter(mut self, filter: impl ExceptionFilter) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Register modules and freeze the container and router.
    ///
    /// `Config` and `EventBus` are registered as container instances before
    /// any module runs, so modules may replace them.
    pub fn build(self) -> Result<Application> {
        let Self {
            config,
            mut container,
            mut router,
            events,
            filter,
            modules,
        } = self;

        container.instance_of(config.clone());
        container.instance_of(events.clone());

        for module in &modules {
            tracing::debug!(module = module.name(), "Registering module");
            module.register(&mut container, &mut router)?;
        }

        let filter =
            filter.unwrap_or_else(|| Arc::new(JsonExceptionFilter::new(config.is_debug())));

        tracing::info!(
            routes = router.len(),
            bindings = container.len(),
            modules = modules.len(),
            debug = config.is_debug(),
            "Application initialized"
        );

        let dispatcher =
            Dispatcher::new(Arc::new(container), Arc::new(router)).with_events(events.clone());
        Ok(Application {
            config: Arc::new(config),
            dispatcher,
            events,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Arguments, Injectable, Parameter};
    use crate::error::TrellisError;
    use crate::routing::Handler;
    use serde_json::json;

    struct Greeter {
        greeting: String,
    }

    impl Injectable for Greeter {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<Config>("config")]
        }

        fn construct(mut args: Arguments) -> Result<Self> {
            let config = args.service::<Config>()?;
            Ok(Self {
                greeting: config.get_or("greeting", String::from("hello")),
            })
        }
    }

    struct GreetModule;

    impl Module for GreetModule {
        fn register(&self, container: &mut Container, router: &mut Router) -> Result<()> {
            container.singleton_type::<Greeter>();
            router.get(
                "/greet/{name}",
                Handler::from_fn(|_request, params: crate::routing::Params| async move {
                    anyhow::Ok(json!({ "name": params[0].to_string() }))
                }),
            )?;
            Ok(())
        }
    }

    struct BrokenModule;

    impl Module for BrokenModule {
        fn register(&self, _container: &mut Container, router: &mut Router) -> Result<()> {
            router.get("/broken/{", Handler::from_fn(|_request, _params| async move {
                anyhow::Ok("never")
            }))?;
            Ok(())
        }
    }

    #[test]
    fn test_config_is_registered_for_services() {
        let mut config = Config::new();
        config.set("greeting", "howdy");
        let app = Application::builder()
            .config(config)
            .module(GreetModule)
            .build()
            .unwrap();

        let greeter = app.container().resolve::<Greeter>().unwrap();
        assert_eq!(greeter.greeting, "howdy");
        assert!(app.container().has_type::<EventBus>());
        assert_eq!(app.router().len(), 1);
    }

    #[test]
    fn test_module_errors_abort_build() {
        let err = Application::builder().module(BrokenModule).build().err();
        assert!(matches!(err, Some(TrellisError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_handle_renders_faults() {
        let mut builder = Application::builder();
        builder
            .router_mut()
            .add_route(
                crate::http::Method::Get,
                "/guarded",
                Handler::from_fn(|_request, _params| async move { anyhow::Ok("secret") }),
                &["auth"],
            )
            .unwrap();
        let app = builder.build().unwrap();

        assert!(matches!(
            app.dispatch(Request::get("/guarded")).await,
            Err(TrellisError::NotFound { .. })
        ));

        let response = app.handle(Request::get("/guarded")).await;
        assert_eq!(response.status(), 500);
        assert_eq!(response.json_body().unwrap()["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_debug_config_selects_verbose_filter() {
        let mut config = Config::new();
        config.set("app.debug", true);
        let mut builder = Application::builder().config(config);
        builder
            .router_mut()
            .get(
                "/fail",
                Handler::from_fn(|_request, _params| async move {
                    Err::<&str, _>(anyhow::anyhow!("database is down"))
                }),
            )
            .unwrap();
        let app = builder.build().unwrap();

        let response = app.handle(Request::get("/fail")).await;
        let body = response.json_body().unwrap();
        assert_eq!(body["error"]["message"], "database is down");
        assert_eq!(body["error"]["kind"], "handler");
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404() {
        let app = Application::builder().build().unwrap();
        let response = app.handle(Request::get("/")).await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.body_string(), "Not Found");
    }
}
