use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use restgraph_graphql::{
    ApiRouter, BridgeError, GraphQLBridge, RequestCustomizer, SchemaCoordinator, SchemaState,
};
use restgraph_openapi::ExtractError;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::demo::demo_api;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("route registration failed: {0}")]
    Routes(#[from] ExtractError),
    #[error("{0}")]
    Bridge(#[from] BridgeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SchemaCoordinator>,
}

pub struct RestgraphServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

/// Mounts the bridge over `api` and adds health endpoints and middleware.
///
/// The GraphQL endpoint serves the placeholder schema until
/// [`RestgraphServer::ready`] runs.
pub fn build_app(
    cfg: &AppConfig,
    api: ApiRouter,
    customizer: Option<Arc<dyn RequestCustomizer>>,
) -> Result<(Router, AppState), ServerError> {
    let mut bridge = GraphQLBridge::new(cfg.bridge.clone());
    if let Some(customizer) = customizer {
        bridge = bridge.with_customizer(customizer);
    }
    let (bridged, coordinator) = bridge.prepare(api)?.into_parts();
    let state = AppState { coordinator };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state.clone())
        .merge(bridged)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            cfg.server.body_limit_bytes,
        ));

    Ok((app, state))
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = &state.coordinator;
    match coordinator.state().await {
        SchemaState::Ready => {
            let diagnostics = coordinator
                .report()
                .await
                .map(|report| report.diagnostics.len())
                .unwrap_or(0);
            (
                StatusCode::OK,
                Json(json!({ "status": "ready", "diagnostics": diagnostics })),
            )
        }
        SchemaState::Failed => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "failed",
                "error": coordinator.last_error().await,
            })),
        ),
        SchemaState::Building => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "building" })),
        ),
        SchemaState::Placeholder => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        ),
    }
}

pub struct ServerBuilder {
    config: AppConfig,
    api: Option<ApiRouter>,
    customizer: Option<Arc<dyn RequestCustomizer>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            api: None,
            customizer: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Routes to bridge. Defaults to the demo API.
    pub fn with_api(mut self, api: ApiRouter) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_customizer(mut self, customizer: Arc<dyn RequestCustomizer>) -> Self {
        self.customizer = Some(customizer);
        self
    }

    pub fn build(self) -> Result<RestgraphServer, ServerError> {
        let api = match self.api {
            Some(api) => api,
            None => demo_api(self.config.bridge.definitions.clone())?,
        };
        let (app, state) = build_app(&self.config, api, self.customizer)?;
        Ok(RestgraphServer {
            addr: self.config.addr(),
            app,
            state,
        })
    }
}

impl RestgraphServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Readiness hook: seals route registration and installs the schema.
    pub async fn ready(&self) -> Result<(), ServerError> {
        let report = self.state.coordinator.ready().await?;
        tracing::info!(
            root_fields = report.graph.root_field_count(),
            diagnostics = report.diagnostics.len(),
            "GraphQL schema ready"
        );
        for diagnostic in &report.diagnostics {
            tracing::warn!(%diagnostic, "synthesis diagnostic");
        }
        Ok(())
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "server listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
