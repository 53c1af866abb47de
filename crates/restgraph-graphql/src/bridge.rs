//! Bridge assembly.
//!
//! [`GraphQLBridge`] wires a host [`ApiRouter`] to a GraphQL endpoint:
//!
//! 1. `prepare` splits the host router, builds the in-process adapter over
//!    its routes and installs the placeholder schema
//! 2. `ready` is the readiness hook; it seals route registration and swaps
//!    in the synthesized schema
//!
//! ```ignore
//! let bridge = GraphQLBridge::new(config.bridge.clone())
//!     .with_customizer(Arc::new(ForwardHeaders::default()));
//! let prepared = bridge.prepare(api)?;
//! prepared.ready().await?;
//! axum::serve(listener, prepared.router()).await?;
//! ```

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::adapter::{Dispatcher, ForwardHeaders, InProcessAdapter, RequestCustomizer};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::handler::{
    GraphQLState, document_handler, graphiql_page, graphql_handler, graphql_handler_get,
};
use crate::host::ApiRouter;
use crate::lifecycle::{LiveSchema, SchemaCoordinator, SynthesisReport};
use crate::schema::{SchemaSynthesizer, placeholder_schema};

/// Path of the GraphiQL explorer.
pub const GRAPHIQL_PATH: &str = "/graphiql";

/// Builder for the GraphQL bridge.
pub struct GraphQLBridge {
    config: BridgeConfig,
    customizer: Option<Arc<dyn RequestCustomizer>>,
}

impl GraphQLBridge {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            customizer: None,
        }
    }

    /// Installs a request customizer, replacing `forward_headers`.
    #[must_use]
    pub fn with_customizer(mut self, customizer: Arc<dyn RequestCustomizer>) -> Self {
        self.customizer = Some(customizer);
        self
    }

    /// Builds the combined router and the schema coordinator.
    ///
    /// The GraphQL endpoint serves the placeholder schema until
    /// [`PreparedBridge::ready`] runs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] for invalid configuration and
    /// [`BridgeError::SynthesisFailed`] if the placeholder cannot be built.
    pub fn prepare(self, api: ApiRouter) -> Result<PreparedBridge, BridgeError> {
        self.config.validate().map_err(BridgeError::Internal)?;
        let (api_router, registry) = api.into_parts();

        let adapter = Arc::new(
            InProcessAdapter::new(api_router.clone())
                .with_response_limit(self.config.max_response_bytes),
        );
        let mut dispatcher = Dispatcher::new(adapter);
        match self.customizer {
            Some(customizer) => dispatcher = dispatcher.with_customizer(customizer),
            None if !self.config.forward_headers.is_empty() => {
                let forward = ForwardHeaders::from_names(&self.config.forward_headers);
                dispatcher = dispatcher.with_customizer(Arc::new(forward));
            }
            None => {}
        }

        let options = self.config.to_synthesis_options();
        let live = Arc::new(LiveSchema::new(placeholder_schema(&options.limits)?));
        let synthesizer = SchemaSynthesizer::new(Arc::new(dispatcher), options);
        let coordinator = Arc::new(SchemaCoordinator::new(
            Arc::clone(&live),
            registry.clone(),
            synthesizer,
        ));

        let graphql_path = self.config.graphql.path.clone();
        let mut router = api_router.merge(
            Router::new()
                .route(
                    &graphql_path,
                    get(graphql_handler_get).post(graphql_handler),
                )
                .with_state(GraphQLState { live }),
        );

        if self.config.graphql.graphiql {
            let page = graphiql_page(&graphql_path);
            router = router.route(GRAPHIQL_PATH, get(move || async move { page }));
        }

        if self.config.expose_route {
            router = router.merge(
                Router::new()
                    .route(&self.config.document_path(), get(document_handler))
                    .with_state(registry),
            );
        }

        info!(
            graphql = %graphql_path,
            graphiql = self.config.graphql.graphiql,
            expose_route = self.config.expose_route,
            "GraphQL bridge mounted"
        );

        Ok(PreparedBridge {
            router,
            coordinator,
        })
    }

    /// Prepares the bridge and runs the readiness hook.
    ///
    /// # Errors
    ///
    /// Fails like [`prepare`](Self::prepare) and [`PreparedBridge::ready`].
    pub async fn mount(self, api: ApiRouter) -> Result<PreparedBridge, BridgeError> {
        let prepared = self.prepare(api)?;
        prepared.ready().await?;
        Ok(prepared)
    }
}

/// A mounted bridge awaiting, or past, its readiness point.
pub struct PreparedBridge {
    router: Router,
    coordinator: Arc<SchemaCoordinator>,
}

impl PreparedBridge {
    /// Readiness hook. See [`SchemaCoordinator::ready`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SynthesisFailed`] if synthesis fails.
    pub async fn ready(&self) -> Result<Arc<SynthesisReport>, BridgeError> {
        self.coordinator.ready().await
    }

    /// Returns the combined REST and GraphQL router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<SchemaCoordinator> {
        &self.coordinator
    }

    /// Splits into the router and the coordinator.
    #[must_use]
    pub fn into_parts(self) -> (Router, Arc<SchemaCoordinator>) {
        (self.router, self.coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use restgraph_openapi::{DocumentDefinition, HttpMethod, RouteSchema, SchemaObject};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn api() -> ApiRouter {
        ApiRouter::new(DocumentDefinition::default())
            .route(
                HttpMethod::Get,
                "/version",
                RouteSchema::new().operation_id("version").response(
                    "200",
                    SchemaObject::object([("version", SchemaObject::of_type("string"))]),
                ),
                || async { Json(json!({"version": "1.2.3"})) },
            )
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn graphql_post(query: &str) -> Request<Body> {
        Request::post("/graphql")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_placeholder_until_ready() {
        let prepared = GraphQLBridge::new(BridgeConfig::default())
            .prepare(api())
            .unwrap();
        let router = prepared.router();

        let (status, body) = send(&router, graphql_post("{ version { version } }")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["errors"].is_array());

        prepared.ready().await.unwrap();
        let (_, body) = send(&router, graphql_post("{ version { version } }")).await;
        assert_eq!(body, json!({"data": {"version": {"version": "1.2.3"}}}));

        // REST routes stay reachable
        let (status, body) = send(&router, Request::get("/version").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "1.2.3");
    }

    #[tokio::test]
    async fn test_get_endpoint_and_document_route() {
        let config = BridgeConfig {
            expose_route: true,
            ..BridgeConfig::default()
        };
        let prepared = GraphQLBridge::new(config).mount(api()).await.unwrap();
        let router = prepared.router();

        let (_, body) = send(
            &router,
            Request::get("/graphql?query=%7B%20version%20%7B%20version%20%7D%20%7D")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["data"]["version"]["version"], "1.2.3");

        let (status, document) = send(
            &router,
            Request::get("/documentation/json").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["paths"]["/version"]["get"]["operationId"], "version");
    }

    #[tokio::test]
    async fn test_optional_routes_disabled_by_default() {
        let prepared = GraphQLBridge::new(BridgeConfig::default())
            .mount(api())
            .await
            .unwrap();
        let router = prepared.router();

        let (status, _) = send(&router, Request::get("/graphiql").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &router,
            Request::get("/documentation/json").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let mut config = BridgeConfig::default();
        config.graphql.graphiql = true;
        let prepared = GraphQLBridge::new(config).prepare(api()).unwrap();

        let response = prepared
            .router()
            .oneshot(Request::get("/graphiql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&html).contains("/graphql"));
    }

    #[tokio::test]
    async fn test_response_limit_applies_to_dispatch() {
        let config = BridgeConfig {
            max_response_bytes: 8,
            ..BridgeConfig::default()
        };
        let router = GraphQLBridge::new(config).mount(api()).await.unwrap().router();

        let (_, body) = send(&router, graphql_post("{ version { version } }")).await;
        assert_eq!(body["data"], json!({"version": null}));
        assert_eq!(body["errors"][0]["path"], json!(["version"]));
        assert_eq!(body["errors"][0]["extensions"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BridgeConfig::default();
        config.graphql.max_complexity = 0;
        let err = GraphQLBridge::new(config).prepare(api()).err().unwrap();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
