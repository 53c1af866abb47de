//! Bridge configuration.
//!
//! Configuration can be specified in `restgraph.toml` under the `[bridge]`
//! section. Every option has a default and unknown keys are ignored.
//!
//! # Example Configuration
//!
//! ```toml
//! [bridge]
//! expose_route = true
//! route_prefix = "/documentation"
//! viewer = false
//! forward_headers = ["authorization"]
//! max_response_bytes = 16777216
//!
//! [bridge.definitions.info]
//! title = "Users API"
//! version = "1.0.0"
//!
//! [bridge.graphql]
//! path = "/graphql"
//! graphiql = true
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! ```

use restgraph_openapi::DocumentDefinition;
use serde::{Deserialize, Serialize};

use crate::adapter::DEFAULT_RESPONSE_LIMIT;
use crate::schema::{SchemaLimits, SynthesisOptions};

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Document-level settings for the generated OpenAPI document.
    #[serde(default)]
    pub definitions: DocumentDefinition,

    /// Publish the OpenAPI document at `<route_prefix>/json`.
    /// Default: false
    #[serde(default = "default_expose_route")]
    pub expose_route: bool,

    /// Prefix of the document route.
    /// Default: "/documentation"
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Group operations secured by a supported scheme under viewer fields
    /// that take the credentials as arguments.
    /// Default: false
    #[serde(default = "default_viewer")]
    pub viewer: bool,

    /// Expose operations marked deprecated.
    /// Default: true
    #[serde(default = "default_include_deprecated")]
    pub include_deprecated: bool,

    /// Inbound headers copied into every synthesized call. Ignored when a
    /// customizer is installed programmatically.
    /// Default: empty
    #[serde(default)]
    pub forward_headers: Vec<String>,

    /// Largest response body buffered from a dispatched REST call.
    /// Default: 16 MiB
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    #[serde(default)]
    pub graphql: GraphQLConfig,
}

/// GraphQL endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Path of the GraphQL endpoint.
    /// Default: "/graphql"
    #[serde(default = "default_path")]
    pub path: String,

    /// Serve the GraphiQL explorer at `/graphiql`.
    /// Default: false
    #[serde(default = "default_graphiql")]
    pub graphiql: bool,

    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable GraphQL introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

fn default_expose_route() -> bool {
    false
}

fn default_route_prefix() -> String {
    "/documentation".to_string()
}

fn default_viewer() -> bool {
    false
}

fn default_include_deprecated() -> bool {
    true
}

fn default_max_response_bytes() -> usize {
    DEFAULT_RESPONSE_LIMIT
}

fn default_path() -> String {
    "/graphql".to_string()
}

fn default_graphiql() -> bool {
    false
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            definitions: DocumentDefinition::default(),
            expose_route: default_expose_route(),
            route_prefix: default_route_prefix(),
            viewer: default_viewer(),
            include_deprecated: default_include_deprecated(),
            forward_headers: Vec::new(),
            max_response_bytes: default_max_response_bytes(),
            graphql: GraphQLConfig::default(),
        }
    }
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            graphiql: default_graphiql(),
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
        }
    }
}

impl BridgeConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.route_prefix.starts_with('/') {
            return Err("bridge.route_prefix must start with '/'".into());
        }
        for name in &self.forward_headers {
            if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(format!("bridge.forward_headers: invalid header name '{name}'"));
            }
        }
        if self.max_response_bytes == 0 {
            return Err("bridge.max_response_bytes must be > 0".into());
        }
        self.graphql.validate()
    }

    /// Converts this config to synthesis options.
    #[must_use]
    pub fn to_synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            viewer: self.viewer,
            include_deprecated: self.include_deprecated,
            limits: self.graphql.to_schema_limits(),
        }
    }

    /// Path of the exposed OpenAPI document.
    #[must_use]
    pub fn document_path(&self) -> String {
        format!("{}/json", self.route_prefix.trim_end_matches('/'))
    }
}

impl GraphQLConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err("bridge.graphql.path must start with '/'".into());
        }
        if self.max_depth == 0 {
            return Err("bridge.graphql.max_depth must be > 0".into());
        }
        if self.max_complexity == 0 {
            return Err("bridge.graphql.max_complexity must be > 0".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn to_schema_limits(&self) -> SchemaLimits {
        SchemaLimits {
            max_depth: self.max_depth,
            max_complexity: self.max_complexity,
            introspection: self.introspection,
        }
    }
}
