use crate::error::Result;
use crate::http::Method;
use crate::routing::{Handler, Params, Pattern};

/// A registered route. Immutable once the router is shared.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
    middleware: Vec<String>,
}

impl Route {
    pub fn new(method: Method, template: &str, handler: Handler) -> Result<Self> {
        Ok(Self {
            method,
            pattern: Pattern::compile(template)?,
            handler,
            middleware: Vec::new(),
        })
    }

    /// Append a route-specific middleware identifier.
    pub fn middleware(&mut self, identifier: impl Into<String>) -> &mut Self {
        self.middleware.push(identifier.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn middleware_ids(&self) -> &[String] {
        &self.middleware
    }
}

/// The outcome of a successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

/// Ordered route table plus the global middleware list.
///
/// Routes are matched linearly in registration order and the first match wins.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    middleware: Vec<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with its route-specific middleware.
    pub fn add_route(
        &mut self,
        method: Method,
        template: &str,
        handler: Handler,
        middleware: &[&str],
    ) -> Result<&mut Route> {
        let mut route = Route::new(method, template, handler)?;
        for identifier in middleware {
            route.middleware(*identifier);
        }
        tracing::debug!(
            method = %method,
            pattern = template,
            handler = ?route.handler,
            middleware = route.middleware.len(),
            "Route registered"
        );

        self.routes.push(route);
        let index = self.routes.len() - 1;
        Ok(&mut self.routes[index])
    }

    pub fn get(&mut self, template: &str, handler: Handler) -> Result<&mut Route> {
        self.add_route(Method::Get, template, handler, &[])
    }

    pub fn post(&mut self, template: &str, handler: Handler) -> Result<&mut Route> {
        self.add_route(Method::Post, template, handler, &[])
    }

    pub fn put(&mut self, template: &str, handler: Handler) -> Result<&mut Route> {
        self.add_route(Method::Put, template, handler, &[])
    }

    pub fn patch(&mut self, template: &str, handler: Handler) -> Result<&mut Route> {
        self.add_route(Method::Patch, template, handler, &[])
    }

    pub fn delete(&mut self, template: &str, handler: Handler) -> Result<&mut Route> {
        self.add_route(Method::Delete, template, handler, &[])
    }

    /// Append a global middleware identifier. Global middleware runs before route middleware.
    pub fn middleware(&mut self, identifier: impl Into<String>) -> &mut Self {
        self.middleware.push(identifier.into());
        self
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.middleware
    }

    /// First route whose method and pattern accept the request, in registration order.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method.matches(method))
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
