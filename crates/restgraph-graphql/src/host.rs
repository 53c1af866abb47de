//! Host API surface.
//!
//! [`ApiRouter`] registers an axum handler and its OpenAPI metadata in one
//! step, so the route table served over HTTP and the document the bridge
//! synthesizes from can never drift apart.

use axum::Router;
use axum::handler::Handler;
use axum::routing::{MethodFilter, MethodRouter, on};
use indexmap::IndexMap;
use restgraph_openapi::{DocumentDefinition, ExtractError, HttpMethod, RouteRegistry, RouteSchema};

/// REST routes plus the registry describing them.
pub struct ApiRouter {
    routes: IndexMap<String, MethodRouter>,
    registry: RouteRegistry,
}

impl ApiRouter {
    /// Creates an empty router whose document uses `definition`.
    #[must_use]
    pub fn new(definition: DocumentDefinition) -> Self {
        Self {
            routes: IndexMap::new(),
            registry: RouteRegistry::new(definition),
        }
    }

    /// Adds a documented route.
    ///
    /// # Errors
    ///
    /// Fails when the method and path are already registered or the registry
    /// has been sealed.
    pub fn route<H, T>(
        mut self,
        method: HttpMethod,
        path: &str,
        schema: RouteSchema,
        handler: H,
    ) -> Result<Self, ExtractError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.registry.register(method, path, schema)?;

        let filter = method_filter(method);
        match self.routes.get_mut(path) {
            Some(slot) => {
                let current = std::mem::replace(slot, MethodRouter::new());
                *slot = current.on(filter, handler);
            }
            None => {
                self.routes.insert(path.to_string(), on(filter, handler));
            }
        }
        Ok(self)
    }

    /// Returns the registry handle.
    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Splits into the axum router and the registry.
    #[must_use]
    pub fn into_parts(self) -> (Router, RouteRegistry) {
        let router = self
            .routes
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| {
                router.route(&path, methods)
            });
        (router, self.registry)
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
        HttpMethod::Trace => MethodFilter::TRACE,
    }
}
