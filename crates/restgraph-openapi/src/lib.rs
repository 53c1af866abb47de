//! # restgraph-openapi
//!
//! OpenAPI side of the restgraph bridge.
//!
//! - [`document`] - Serde model of OpenAPI 3.x documents
//! - [`descriptor`] - Flattened per-operation descriptors and links
//! - [`expression`] - Runtime expressions used by link parameters
//! - [`naming`] - Deterministic GraphQL-safe naming
//! - [`registry`] - Route registry that renders the finalized document

pub mod descriptor;
pub mod document;
pub mod expression;
pub mod naming;
pub mod registry;

pub use descriptor::{
    BodyDescriptor, HttpMethod, LinkDescriptor, OperationDescriptor, ParameterDescriptor,
    ResponseDescriptor, collect_operations,
};
pub use document::{OpenApiDocument, ParameterLocation, SchemaObject, SecurityScheme};
pub use expression::{ExpressionError, RecordedExchange, SourceExpression};
pub use registry::{DocumentDefinition, ExtractError, RouteLink, RouteRegistry, RouteSchema};
