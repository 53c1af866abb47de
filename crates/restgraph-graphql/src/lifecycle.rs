//! Schema lifecycle.
//!
//! The GraphQL endpoint starts serving a placeholder schema right away. Once
//! the host signals that route registration is complete, the coordinator
//! seals the registry, synthesizes the real schema and swaps it in. Queries
//! that already captured the previous schema finish against it.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = SchemaCoordinator::new(live, registry, synthesizer);
//!
//! // Readiness hook: seal routes and install the synthesized schema
//! let report = coordinator.ready().await?;
//!
//! // Later calls are no-ops returning the same report
//! let same = coordinator.ready().await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use async_graphql::dynamic::Schema;
use restgraph_openapi::RouteRegistry;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::schema::{SchemaGraph, SchemaSynthesizer, Synthesized};

/// The schema queries execute against.
pub struct LiveSchema {
    current: ArcSwap<Schema>,
}

impl LiveSchema {
    #[must_use]
    pub fn new(initial: Schema) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Captures the current schema.
    #[must_use]
    pub fn load(&self) -> Arc<Schema> {
        self.current.load_full()
    }

    /// Replaces the current schema.
    pub fn install(&self, schema: Schema) {
        self.current.store(Arc::new(schema));
    }
}

/// State of the live schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// The placeholder is installed and no synthesis has run.
    Placeholder,
    /// A synthesis pass is running.
    Building,
    /// A synthesized schema is installed.
    Ready,
    /// Synthesis failed and no synthesized schema is installed.
    Failed,
}

/// What the last successful synthesis produced.
#[derive(Debug, Clone)]
pub struct SynthesisReport {
    pub graph: SchemaGraph,
    pub diagnostics: Vec<String>,
}

/// Runs synthesis at the readiness point and installs the result.
pub struct SchemaCoordinator {
    live: Arc<LiveSchema>,
    registry: RouteRegistry,
    synthesizer: SchemaSynthesizer,

    /// At most one synthesis pass at a time.
    build_lock: Mutex<()>,

    state: RwLock<SchemaState>,
    last_error: RwLock<Option<String>>,
    report: RwLock<Option<Arc<SynthesisReport>>>,
}

impl SchemaCoordinator {
    #[must_use]
    pub fn new(
        live: Arc<LiveSchema>,
        registry: RouteRegistry,
        synthesizer: SchemaSynthesizer,
    ) -> Self {
        Self {
            live,
            registry,
            synthesizer,
            build_lock: Mutex::new(()),
            state: RwLock::new(SchemaState::Placeholder),
            last_error: RwLock::new(None),
            report: RwLock::new(None),
        }
    }

    /// Readiness hook.
    ///
    /// Seals route registration and installs the synthesized schema. Once a
    /// schema is installed, further calls return the existing report without
    /// synthesizing again.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SynthesisFailed`] if synthesis fails. The
    /// previously installed schema stays live.
    pub async fn ready(&self) -> Result<Arc<SynthesisReport>, BridgeError> {
        self.registry.seal();
        let _guard = self.build_lock.lock().await;

        // Double-check after acquiring lock
        if let Some(report) = self.report.read().await.as_ref() {
            return Ok(Arc::clone(report));
        }
        self.run().await
    }

    /// Forces another synthesis pass and installs its result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SynthesisFailed`] if synthesis fails. The
    /// previously installed schema stays live.
    pub async fn resynthesize(&self) -> Result<Arc<SynthesisReport>, BridgeError> {
        self.registry.seal();
        let _guard = self.build_lock.lock().await;
        self.run().await
    }

    async fn run(&self) -> Result<Arc<SynthesisReport>, BridgeError> {
        *self.state.write().await = SchemaState::Building;
        info!("Synthesizing GraphQL schema...");
        let started = Instant::now();

        let result = self
            .registry
            .current_document()
            .map_err(BridgeError::from)
            .and_then(|document| self.synthesizer.synthesize(&document));

        match result {
            Ok(Synthesized {
                schema,
                graph,
                diagnostics,
            }) => {
                self.live.install(schema);
                let report = Arc::new(SynthesisReport { graph, diagnostics });
                *self.report.write().await = Some(Arc::clone(&report));
                *self.state.write().await = SchemaState::Ready;
                *self.last_error.write().await = None;
                info!(
                    root_fields = report.graph.root_field_count(),
                    diagnostics = report.diagnostics.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "GraphQL schema installed"
                );
                Ok(report)
            }
            Err(e) => {
                let error_msg = match e {
                    BridgeError::SynthesisFailed(msg) => msg,
                    other => other.to_string(),
                };
                warn!(error = %error_msg, "Failed to synthesize GraphQL schema");
                // Ready while a synthesized schema is installed
                let state = if self.report.read().await.is_some() {
                    SchemaState::Ready
                } else {
                    SchemaState::Failed
                };
                *self.state.write().await = state;
                *self.last_error.write().await = Some(error_msg.clone());
                Err(BridgeError::SynthesisFailed(error_msg))
            }
        }
    }

    /// Returns the live schema handle.
    #[must_use]
    pub fn live(&self) -> &Arc<LiveSchema> {
        &self.live
    }

    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub async fn state(&self) -> SchemaState {
        *self.state.read().await
    }

    /// Returns whether a synthesized schema is installed.
    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == SchemaState::Ready
    }

    /// Returns the last synthesis error, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Returns the report of the installed schema.
    pub async fn report(&self) -> Option<Arc<SynthesisReport>> {
        self.report.read().await.clone()
    }
}
