//! Route registry: the source of the finalized OpenAPI document.
//!
//! Routes are registered together with their [`RouteSchema`] while the host
//! router is being assembled. Once the host declares registration complete
//! with [`RouteRegistry::seal`], [`RouteRegistry::current_document`] renders
//! the full document. Asking for the document earlier is an error rather than
//! a partial answer.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::descriptor::HttpMethod;
use crate::document::{
    Components, Info, Link, MediaType, OpenApiDocument, Operation, Parameter, ParameterLocation,
    PathItem, RequestBody, Response, SchemaObject, SecurityRequirement, SecurityScheme, Server,
    Tag, default_openapi_version,
};

/// Errors raised by the route registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The document was requested before route registration completed.
    #[error("route registration is still open; the OpenAPI document is not final")]
    NotReady,

    /// A route was registered after registration completed.
    #[error("route registration is closed; cannot register {method} {path}")]
    RegistrationClosed { method: HttpMethod, path: String },

    /// The same method and path were registered twice.
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: HttpMethod, path: String },
}

/// Document-level settings used when rendering the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDefinition {
    #[serde(default = "default_openapi_version")]
    pub openapi: String,

    #[serde(default)]
    pub info: Info,

    #[serde(default)]
    pub servers: Vec<Server>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Security schemes published under `components.securitySchemes`.
    #[serde(default, alias = "securitySchemes")]
    pub security_schemes: IndexMap<String, SecurityScheme>,

    /// Schemas published under `components.schemas`.
    #[serde(default)]
    pub schemas: IndexMap<String, SchemaObject>,

    /// Document-wide security requirements.
    #[serde(default)]
    pub security: Vec<SecurityRequirement>,
}

impl Default for DocumentDefinition {
    fn default() -> Self {
        Self {
            openapi: default_openapi_version(),
            info: Info::default(),
            servers: Vec::new(),
            tags: Vec::new(),
            security_schemes: IndexMap::new(),
            schemas: IndexMap::new(),
            security: Vec::new(),
        }
    }
}

/// A link declared on a route response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLink {
    pub operation_id: String,

    /// Target parameter name to runtime expression.
    #[serde(default)]
    pub parameters: IndexMap<String, JsonValue>,

    #[serde(default)]
    pub description: Option<String>,
}

impl RouteLink {
    /// Creates a link to `operation_id`.
    #[must_use]
    pub fn to(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            ..Self::default()
        }
    }

    /// Adds a parameter mapping.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, expression: impl Into<JsonValue>) -> Self {
        self.parameters.insert(name.into(), expression.into());
        self
    }
}

/// Per-route metadata in the host framework's vocabulary.
///
/// `params`, `querystring` and `headers` are object schemas whose properties
/// become parameters of the corresponding location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSchema {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub params: Option<SchemaObject>,
    #[serde(default)]
    pub querystring: Option<SchemaObject>,
    #[serde(default)]
    pub headers: Option<SchemaObject>,
    #[serde(default)]
    pub body: Option<SchemaObject>,
    /// Response schemas keyed by status code.
    #[serde(default)]
    pub response: IndexMap<String, SchemaObject>,
    /// Links keyed by status code, then link name.
    #[serde(default)]
    pub links: IndexMap<String, IndexMap<String, RouteLink>>,
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default)]
    pub deprecated: bool,
    /// Omit the route from the document.
    #[serde(default)]
    pub hide: bool,
}

impl RouteSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn params(mut self, schema: SchemaObject) -> Self {
        self.params = Some(schema);
        self
    }

    #[must_use]
    pub fn querystring(mut self, schema: SchemaObject) -> Self {
        self.querystring = Some(schema);
        self
    }

    #[must_use]
    pub fn headers(mut self, schema: SchemaObject) -> Self {
        self.headers = Some(schema);
        self
    }

    #[must_use]
    pub fn body(mut self, schema: SchemaObject) -> Self {
        self.body = Some(schema);
        self
    }

    #[must_use]
    pub fn response(mut self, status: impl Into<String>, schema: SchemaObject) -> Self {
        self.response.insert(status.into(), schema);
        self
    }

    #[must_use]
    pub fn link(mut self, status: impl Into<String>, name: impl Into<String>, link: RouteLink) -> Self {
        self.links
            .entry(status.into())
            .or_default()
            .insert(name.into(), link);
        self
    }

    /// Requires the named security scheme.
    #[must_use]
    pub fn secured_by(mut self, scheme: impl Into<String>) -> Self {
        let mut requirement = SecurityRequirement::new();
        requirement.insert(scheme.into(), Vec::new());
        self.security.get_or_insert_with(Vec::new).push(requirement);
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }
}

#[derive(Debug)]
struct RegisteredRoute {
    method: HttpMethod,
    path: String,
    schema: RouteSchema,
}

#[derive(Debug, Default)]
struct RegistryInner {
    definition: DocumentDefinition,
    routes: Vec<RegisteredRoute>,
    sealed: bool,
}

/// Shared handle to the set of registered routes.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl RouteRegistry {
    /// Creates an open registry.
    #[must_use]
    pub fn new(definition: DocumentDefinition) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                definition,
                routes: Vec::new(),
                sealed: false,
            })),
        }
    }

    /// Registers route metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::RegistrationClosed`] after [`seal`](Self::seal)
    /// and [`ExtractError::DuplicateRoute`] for a repeated method and path.
    pub fn register(
        &self,
        method: HttpMethod,
        path: &str,
        schema: RouteSchema,
    ) -> Result<(), ExtractError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.sealed {
            return Err(ExtractError::RegistrationClosed {
                method,
                path: path.to_string(),
            });
        }
        if inner
            .routes
            .iter()
            .any(|r| r.method == method && r.path == path)
        {
            return Err(ExtractError::DuplicateRoute {
                method,
                path: path.to_string(),
            });
        }
        debug!(%method, path, "Registered route");
        inner.routes.push(RegisteredRoute {
            method,
            path: path.to_string(),
            schema,
        });
        Ok(())
    }

    /// Marks registration complete. Further registrations fail.
    pub fn seal(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.sealed {
            inner.sealed = true;
            debug!(routes = inner.routes.len(), "Route registration sealed");
        }
    }

    /// Returns whether registration has completed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed
    }

    /// Number of registered routes, hidden ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the finalized OpenAPI document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NotReady`] while registration is still open.
    pub fn current_document(&self) -> Result<OpenApiDocument, ExtractError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if !inner.sealed {
            return Err(ExtractError::NotReady);
        }
        Ok(render(&inner.definition, &inner.routes))
    }
}

fn render(definition: &DocumentDefinition, routes: &[RegisteredRoute]) -> OpenApiDocument {
    let mut paths: IndexMap<String, PathItem> = IndexMap::new();
    for route in routes.iter().filter(|r| !r.schema.hide) {
        let item = paths.entry(route.path.clone()).or_default();
        *item.operation_mut(route.method) = Some(render_operation(&route.schema));
    }

    let components = Components {
        schemas: definition.schemas.clone(),
        security_schemes: definition.security_schemes.clone(),
    };

    OpenApiDocument {
        openapi: definition.openapi.clone(),
        info: definition.info.clone(),
        servers: definition.servers.clone(),
        paths,
        components: (!components.is_empty()).then_some(components),
        security: definition.security.clone(),
        tags: definition.tags.clone(),
    }
}

fn object_parameters(
    schema: Option<&SchemaObject>,
    location: ParameterLocation,
) -> impl Iterator<Item = Parameter> + '_ {
    schema.into_iter().flat_map(move |schema| {
        schema.properties.iter().map(move |(name, property)| {
            let mut property = property.clone();
            let description = property.description.take();
            Parameter {
                name: name.clone(),
                location,
                description,
                required: location == ParameterLocation::Path || schema.is_required(name),
                schema: Some(property),
                deprecated: false,
            }
        })
    })
}

fn json_content(schema: SchemaObject) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(
        "application/json".to_string(),
        MediaType {
            schema: Some(schema),
        },
    );
    content
}

fn render_operation(schema: &RouteSchema) -> Operation {
    let parameters = object_parameters(schema.params.as_ref(), ParameterLocation::Path)
        .chain(object_parameters(
            schema.querystring.as_ref(),
            ParameterLocation::Query,
        ))
        .chain(object_parameters(
            schema.headers.as_ref(),
            ParameterLocation::Header,
        ))
        .collect();

    let request_body = schema.body.as_ref().map(|body| RequestBody {
        description: body.description.clone(),
        content: json_content(body.clone()),
        required: false,
    });

    let mut responses: IndexMap<String, Response> = schema
        .response
        .iter()
        .map(|(status, response)| {
            let mut body = response.clone();
            let description = body
                .description
                .take()
                .unwrap_or_else(|| "Default Response".to_string());
            (
                status.clone(),
                Response {
                    description,
                    content: json_content(body),
                    links: IndexMap::new(),
                },
            )
        })
        .collect();

    for (status, links) in &schema.links {
        let response = responses.entry(status.clone()).or_insert_with(|| Response {
            description: "Default Response".to_string(),
            ..Response::default()
        });
        for (name, link) in links {
            response.links.insert(
                name.clone(),
                Link {
                    operation_id: Some(link.operation_id.clone()),
                    parameters: link.parameters.clone(),
                    description: link.description.clone(),
                    ..Link::default()
                },
            );
        }
    }

    if responses.is_empty() {
        responses.insert(
            "200".to_string(),
            Response {
                description: "Default Response".to_string(),
                ..Response::default()
            },
        );
    }

    Operation {
        operation_id: schema.operation_id.clone(),
        summary: schema.summary.clone(),
        description: schema.description.clone(),
        tags: schema.tags.clone(),
        parameters,
        request_body,
        responses,
        security: schema.security.clone(),
        deprecated: schema.deprecated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    fn user_route() -> RouteSchema {
        RouteSchema::new()
            .description("get a user")
            .params(SchemaObject::object([(
                "id",
                SchemaObject::of_type("string").with_description("user id"),
            )]))
            .querystring(
                SchemaObject::object([
                    ("verbose", SchemaObject::of_type("boolean")),
                    ("page", SchemaObject::of_type("integer")),
                ])
                .with_required(["page"]),
            )
            .response(
                "201",
                SchemaObject::object([
                    ("name", SchemaObject::of_type("string")),
                    ("companyId", SchemaObject::of_type("string")),
                ])
                .with_description("Succesful response"),
            )
            .link(
                "201",
                "company",
                RouteLink::to("getCompany").param("id", "$request.path.id"),
            )
    }

    #[test]
    fn test_document_unavailable_before_seal() {
        let registry = RouteRegistry::new(DocumentDefinition::default());
        registry
            .register(HttpMethod::Get, "/user/{id}", user_route())
            .unwrap();
        assert_eq!(registry.current_document(), Err(ExtractError::NotReady));

        registry.seal();
        assert!(registry.current_document().is_ok());
    }

    #[test]
    fn test_registration_closed_after_seal() {
        let registry = RouteRegistry::default();
        registry.seal();
        let err = registry
            .register(HttpMethod::Get, "/late", RouteSchema::new())
            .unwrap_err();
        assert!(matches!(err, ExtractError::RegistrationClosed { .. }));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let registry = RouteRegistry::default();
        registry
            .register(HttpMethod::Get, "/a", RouteSchema::new())
            .unwrap();
        registry
            .register(HttpMethod::Post, "/a", RouteSchema::new())
            .unwrap();
        let err = registry
            .register(HttpMethod::Get, "/a", RouteSchema::new())
            .unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateRoute { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rendered_document_shape() {
        let registry = RouteRegistry::new(DocumentDefinition::default());
        registry
            .register(HttpMethod::Get, "/user/{id}", user_route())
            .unwrap();
        registry
            .register(HttpMethod::Get, "/internal", RouteSchema::new().hidden())
            .unwrap();
        registry.seal();

        let doc = registry.current_document().unwrap();
        assert_eq!(doc.paths.len(), 1);
        assert_json_include!(
            actual: doc.to_json(),
            expected: json!({
                "paths": {
                    "/user/{id}": {
                        "get": {
                            "description": "get a user",
                            "parameters": [
                                {"name": "id", "in": "path", "required": true, "description": "user id"},
                                {"name": "verbose", "in": "query"},
                                {"name": "page", "in": "query", "required": true}
                            ],
                            "responses": {
                                "201": {
                                    "description": "Succesful response",
                                    "links": {
                                        "company": {
                                            "operationId": "getCompany",
                                            "parameters": {"id": "$request.path.id"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_definition_components_are_published() {
        let mut definition = DocumentDefinition::default();
        definition.security_schemes.insert(
            "bearerAuth".into(),
            serde_json::from_value(json!({"type": "http", "scheme": "bearer"})).unwrap(),
        );
        let registry = RouteRegistry::new(definition);
        registry.seal();

        let doc = registry.current_document().unwrap();
        assert!(doc.security_scheme("bearerAuth").is_some());
        assert!(doc.paths.is_empty());
    }
}
