//! # restgraph-graphql
//!
//! GraphQL layer of the restgraph bridge.
//!
//! This crate exposes the routes of an axum application as a GraphQL API
//! without hand-written resolvers. It supports:
//!
//! - Query and mutation fields synthesized from the OpenAPI document
//! - Nested fields built from OpenAPI `links`
//! - In-process dispatch of the underlying REST calls, with a hook to
//!   customize each call from the inbound GraphQL request
//! - A placeholder schema swapped for the real one at the readiness point
//!
//! ## Overview
//!
//! Routes are registered through [`ApiRouter`], which records their
//! metadata in a [`restgraph_openapi::RouteRegistry`]. [`GraphQLBridge`]
//! mounts the GraphQL endpoint next to them and, once the host calls the
//! readiness hook, seals the registry and synthesizes the schema.
//!
//! ## Endpoints
//!
//! - `POST /graphql` - GraphQL endpoint
//! - `GET /graphql` - GraphQL endpoint (query via URL param)
//! - `GET /graphiql` - Explorer, when enabled
//! - `GET /documentation/json` - OpenAPI document, when exposed
//!
//! ## Modules
//!
//! - [`adapter`] - Call specifications, in-process dispatch and customizers
//! - [`bridge`] - Bridge assembly
//! - [`config`] - Configuration options
//! - [`context`] - Per-request execution context
//! - [`error`] - Error types
//! - [`handler`] - Axum HTTP handlers
//! - [`host`] - Host route registration
//! - [`lifecycle`] - Live schema and synthesis coordination
//! - [`schema`] - Schema synthesis

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod host;
pub mod lifecycle;
pub mod schema;

// Re-export main types
pub use adapter::{
    CallBody, CallResult, CallSpecification, CustomizeError, Dispatcher, FnCustomizer,
    ForwardHeaders, InProcessAdapter, RequestAdapter, RequestCustomizer, customize_fn,
};
pub use bridge::{GraphQLBridge, PreparedBridge};
pub use config::{BridgeConfig, GraphQLConfig};
pub use context::RequestContext;
pub use error::BridgeError;
pub use host::ApiRouter;
pub use lifecycle::{LiveSchema, SchemaCoordinator, SchemaState, SynthesisReport};
pub use schema::{SchemaGraph, SchemaSynthesizer, SynthesisOptions, Synthesized};
