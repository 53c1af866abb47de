//! OpenAPI 3.x document model.
//!
//! Only the subset of the OpenAPI object model that drives GraphQL synthesis is
//! modelled here. Every map keeps insertion order so that walking a document
//! always happens in the order the document was authored or generated, which
//! is what makes synthesized names stable between runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::descriptor::HttpMethod;

/// Prefix of local schema references.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Maximum number of `$ref` hops followed before giving up.
const MAX_REF_DEPTH: usize = 32;

/// Security requirement: scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// Root OpenAPI document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version string.
    #[serde(default = "default_openapi_version")]
    pub openapi: String,

    /// API information.
    #[serde(default)]
    pub info: Info,

    /// Server definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,

    /// Path items keyed by path template.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,

    /// Reusable components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,

    /// Document-wide security requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,

    /// Tag declarations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

pub(crate) fn default_openapi_version() -> String {
    "3.0.3".to_string()
}

impl Default for OpenApiDocument {
    fn default() -> Self {
        Self {
            openapi: default_openapi_version(),
            info: Info::default(),
            servers: Vec::new(),
            paths: IndexMap::new(),
            components: None,
            security: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl OpenApiDocument {
    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the text is not a document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Renders the document as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// Returns the number of operations across all paths.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|item| item.operations().count()).sum()
    }

    /// Looks up a named component schema.
    #[must_use]
    pub fn component_schema(&self, name: &str) -> Option<&SchemaObject> {
        self.components.as_ref()?.schemas.get(name)
    }

    /// Looks up a named security scheme.
    #[must_use]
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.components.as_ref()?.security_schemes.get(name)
    }

    /// Follows local `$ref` chains until a concrete schema is reached.
    ///
    /// Returns the concrete schema together with the name of the last
    /// component visited, if any. Unknown or non-local references and
    /// reference cycles resolve to `None`.
    #[must_use]
    pub fn resolve_schema<'a>(
        &'a self,
        schema: &'a SchemaObject,
    ) -> Option<(&'a SchemaObject, Option<&'a str>)> {
        let mut current = schema;
        let mut name = None;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = current.reference.as_deref() else {
                return Some((current, name));
            };
            let component = reference.strip_prefix(SCHEMA_REF_PREFIX)?;
            current = self.component_schema(component)?;
            name = Some(component);
        }
        None
    }
}

/// API information block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    #[serde(default = "default_title")]
    pub title: String,

    /// API description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// API version.
    #[serde(default = "default_api_version")]
    pub version: String,
}

fn default_title() -> String {
    "restgraph".to_string()
}

fn default_api_version() -> String {
    "1.0.0".to_string()
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: None,
            version: default_api_version(),
        }
    }
}

/// Server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Tag declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations available on one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,

    /// Parameters shared by every operation on this path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    /// Iterates the operations of this path in a fixed method order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Head, &self.head),
            (HttpMethod::Options, &self.options),
            (HttpMethod::Trace, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }

    /// Returns the slot holding the operation for `method`.
    pub fn operation_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Trace => &mut self.trace,
        }
    }
}

/// A single API operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,

    /// Responses keyed by status code, `2XX`-style range, or `default`.
    #[serde(default)]
    pub responses: IndexMap<String, Response>,

    /// Operation-level security; overrides the document-level requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Returns the OpenAPI spelling of the location.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// Operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "in")]
    pub location: ParameterLocation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaObject>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Request body declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Media types keyed by content type.
    #[serde(default)]
    pub content: IndexMap<String, MediaType>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// Media type entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaObject>,
}

/// Picks the JSON entry of a content map, falling back to the first entry.
pub fn json_media_entry(content: &IndexMap<String, MediaType>) -> Option<(&String, &MediaType)> {
    content
        .iter()
        .find(|(ty, _)| ty.as_str() == "application/json")
        .or_else(|| content.iter().find(|(ty, _)| ty.contains("json")))
        .or_else(|| content.first())
}

/// Media type half of [`json_media_entry`].
pub fn json_media_type(content: &IndexMap<String, MediaType>) -> Option<&MediaType> {
    json_media_entry(content).map(|(_, media)| media)
}

/// Declared response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,

    /// Links keyed by link name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, Link>,
}

/// Link from a response to another operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_ref: Option<String>,

    /// Target parameter name to runtime expression (or literal).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reusable components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, SchemaObject>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

impl Components {
    /// Returns true when no component is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

/// Security scheme declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    /// `http`, `apiKey`, `oauth2` or `openIdConnect`.
    #[serde(rename = "type")]
    pub scheme_type: String,

    /// HTTP auth scheme (`bearer`, `basic`) for `http` schemes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,

    /// Header or query parameter name for `apiKey` schemes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `header`, `query` or `cookie` for `apiKey` schemes.
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `type` keyword: a single type name or a list (`["string", "null"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

impl SchemaType {
    /// Returns the first non-`null` type name.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Single(name) => Some(name.as_str()),
            Self::Multiple(names) => names.iter().map(String::as_str).find(|n| *n != "null"),
        }
    }
}

/// JSON-schema subset used for parameters, bodies and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaObject>>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<JsonValue>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaObject>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<JsonValue>,
}

impl SchemaObject {
    /// Creates a schema of the given primitive type.
    #[must_use]
    pub fn of_type(name: &str) -> Self {
        Self {
            schema_type: Some(SchemaType::Single(name.to_string())),
            ..Self::default()
        }
    }

    /// Creates a local reference to a component schema.
    #[must_use]
    pub fn reference(component: &str) -> Self {
        Self {
            reference: Some(format!("{SCHEMA_REF_PREFIX}{component}")),
            ..Self::default()
        }
    }

    /// Creates an object schema from `(name, schema)` pairs.
    #[must_use]
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaObject)>,
        K: Into<String>,
    {
        Self {
            schema_type: Some(SchemaType::Single("object".to_string())),
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }

    /// Creates an array schema.
    #[must_use]
    pub fn array(items: SchemaObject) -> Self {
        Self {
            schema_type: Some(SchemaType::Single("array".to_string())),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the required property list.
    #[must_use]
    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the primary type name, if declared.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.schema_type.as_ref().and_then(SchemaType::primary)
    }

    /// Returns whether the schema describes an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.type_name() == Some("object") || !self.properties.is_empty()
    }

    /// Returns whether `property` is listed as required.
    #[must_use]
    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_preserves_path_order() {
        let doc = OpenApiDocument::from_json(
            r#"{
                "openapi": "3.0.3",
                "info": {"title": "t", "version": "1"},
                "paths": {
                    "/zeta": {"get": {"responses": {}}},
                    "/alpha": {"get": {"responses": {}}, "post": {"responses": {}}}
                }
            }"#,
        )
        .unwrap();

        let paths: Vec<_> = doc.paths.keys().cloned().collect();
        assert_eq!(paths, vec!["/zeta", "/alpha"]);
        assert_eq!(doc.operation_count(), 3);
    }

    #[test]
    fn test_schema_type_list() {
        let schema: SchemaObject =
            serde_json::from_str(r#"{"type": ["null", "integer"]}"#).unwrap();
        assert_eq!(schema.type_name(), Some("integer"));
    }

    #[test]
    fn test_resolve_schema_follows_refs() {
        let mut doc = OpenApiDocument::default();
        let mut components = Components::default();
        components.schemas.insert("Alias".into(), SchemaObject::reference("User"));
        components.schemas.insert(
            "User".into(),
            SchemaObject::object([("name", SchemaObject::of_type("string"))]),
        );
        doc.components = Some(components);

        let reference = SchemaObject::reference("Alias");
        let (resolved, name) = doc.resolve_schema(&reference).unwrap();
        assert_eq!(name, Some("User"));
        assert!(resolved.properties.contains_key("name"));
    }

    #[test]
    fn test_resolve_schema_cycle_and_unknown() {
        let mut doc = OpenApiDocument::default();
        let mut components = Components::default();
        components.schemas.insert("A".into(), SchemaObject::reference("B"));
        components.schemas.insert("B".into(), SchemaObject::reference("A"));
        doc.components = Some(components);

        assert!(doc.resolve_schema(&SchemaObject::reference("A")).is_none());
        assert!(doc.resolve_schema(&SchemaObject::reference("Missing")).is_none());
    }

    #[test]
    fn test_json_media_type_preference() {
        let mut content = IndexMap::new();
        content.insert("text/plain".to_string(), MediaType::default());
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: Some(SchemaObject::of_type("string")),
            },
        );
        let media = json_media_type(&content).unwrap();
        assert!(media.schema.is_some());
    }

    #[test]
    fn test_operation_round_trips_camel_case() {
        let op: Operation = serde_json::from_str(
            r#"{"operationId": "getUser", "requestBody": {"content": {}, "required": true}}"#,
        )
        .unwrap();
        assert_eq!(op.operation_id.as_deref(), Some("getUser"));
        assert!(op.request_body.unwrap().required);
    }
}
