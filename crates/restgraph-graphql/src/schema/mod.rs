//! GraphQL schema synthesis.
//!
//! This module turns the finalized OpenAPI document into a dynamic
//! async-graphql schema whose resolvers dispatch in-process REST calls.
//!
//! ## Components
//!
//! - [`SchemaSynthesizer`] - Builds the schema and its [`SchemaGraph`]
//! - [`placeholder_schema`] - Minimal valid schema served until synthesis completes
//!
//! ## Mapping
//!
//! - Operations become root fields named after their `operationId`
//! - `GET` operations go on `Query`, `PUT`/`POST`/`PATCH`/`DELETE` on `Mutation`
//! - Path, query and header parameters become arguments; a request body
//!   becomes a single `<field>Input` argument
//! - The lowest 2xx response schema becomes the output type; structurally
//!   identical schemas share one type
//! - Response `links` become nested fields on the output type

mod builder;
mod graph;
mod links;
mod operation;
mod types;
mod values;
mod viewer;

pub use builder::{
    PLACEHOLDER_FIELD, SchemaLimits, SchemaSynthesizer, SynthesisOptions, Synthesized,
    placeholder_schema,
};
pub use graph::{ArgumentDef, EnumDef, FieldDef, GraphType, ObjectDef, SchemaGraph};
pub use types::JSON_SCALAR;
