//! Operation descriptors derived from an OpenAPI document.
//!
//! Descriptors flatten the document into one record per operation with
//! path-level parameters merged in, the success response selected and links
//! parsed into [`SourceExpression`]s. They are built once and read-only
//! afterwards.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{
    OpenApiDocument, Operation, Parameter, ParameterLocation, Response, SchemaObject,
    json_media_entry, json_media_type,
};
use crate::expression::SourceExpression;
use crate::naming::derive_operation_id;

/// HTTP methods an OpenAPI path item may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Returns the upper-case method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }

    /// Returns true for methods synthesized as GraphQL mutations.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::Patch | Self::Delete)
    }

    /// Returns true for methods that can be exposed through GraphQL at all.
    #[must_use]
    pub fn is_exposable(&self) -> bool {
        !matches!(self, Self::Head | Self::Options | Self::Trace)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub schema: SchemaObject,
    pub required: bool,
    pub description: Option<String>,
}

/// Request body of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub content_type: String,
    pub schema: SchemaObject,
    pub required: bool,
    pub description: Option<String>,
}

/// A declared response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    /// Status key as written in the document.
    pub status: String,
    pub description: String,
    pub schema: Option<SchemaObject>,
    pub links: Vec<LinkDescriptor>,
}

/// A link from one operation's response to another operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescriptor {
    pub name: String,
    pub target_operation_id: String,
    /// Target parameter name to source expression. Location qualifiers such
    /// as `path.id` have already been stripped.
    pub parameters: IndexMap<String, SourceExpression>,
    pub request_body: Option<SourceExpression>,
    pub description: Option<String>,
}

/// One flattened operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub operation_id: String,
    /// Whether `operation_id` was present in the document.
    pub explicit_id: bool,
    pub method: HttpMethod,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub request_body: Option<BodyDescriptor>,
    pub responses: Vec<ResponseDescriptor>,
    /// Names of the security schemes any requirement refers to.
    pub security: Vec<String>,
    pub deprecated: bool,
}

impl OperationDescriptor {
    /// Returns true for PUT/POST/PATCH/DELETE.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.method.is_mutation()
    }

    /// Selects the success response: the lowest numeric 2xx status, then a
    /// `2XX` range, then `default`.
    #[must_use]
    pub fn success_response(&self) -> Option<&ResponseDescriptor> {
        self.responses
            .iter()
            .filter_map(|r| r.status.parse::<u16>().ok().map(|code| (code, r)))
            .filter(|(code, _)| (200..300).contains(code))
            .min_by_key(|(code, _)| *code)
            .map(|(_, r)| r)
            .or_else(|| {
                self.responses
                    .iter()
                    .find(|r| r.status.eq_ignore_ascii_case("2XX"))
            })
            .or_else(|| self.responses.iter().find(|r| r.status == "default"))
    }

    /// Finds a parameter by name, optionally qualified with a location
    /// prefix such as `path.id`.
    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        if let Some((prefix, rest)) = name.split_once('.') {
            let location = match prefix {
                "path" => Some(ParameterLocation::Path),
                "query" => Some(ParameterLocation::Query),
                "header" => Some(ParameterLocation::Header),
                _ => None,
            };
            if let Some(location) = location {
                return self
                    .parameters
                    .iter()
                    .find(|p| p.location == location && p.name == rest);
            }
        }
        self.parameters.iter().find(|p| p.name == name)
    }
}

fn merge_parameters(shared: &[Parameter], own: &[Parameter]) -> Vec<ParameterDescriptor> {
    let mut merged: IndexMap<(ParameterLocation, String), &Parameter> = IndexMap::new();
    for param in shared.iter().chain(own) {
        merged.insert((param.location, param.name.clone()), param);
    }

    merged
        .into_values()
        .filter(|p| p.location != ParameterLocation::Cookie)
        .map(|p| ParameterDescriptor {
            name: p.name.clone(),
            location: p.location,
            schema: p
                .schema
                .clone()
                .unwrap_or_else(|| SchemaObject::of_type("string")),
            required: p.required || p.location == ParameterLocation::Path,
            description: p.description.clone(),
        })
        .collect()
}

fn strip_location(name: &str) -> String {
    match name.split_once('.') {
        Some(("path" | "query" | "header", rest)) => rest.to_string(),
        _ => name.to_string(),
    }
}

fn collect_links(response: &Response) -> Vec<LinkDescriptor> {
    response
        .links
        .iter()
        .filter_map(|(name, link)| {
            let Some(target) = link.operation_id.clone() else {
                debug!(link = %name, "Skipping link without operationId");
                return None;
            };
            Some(LinkDescriptor {
                name: name.clone(),
                target_operation_id: target,
                parameters: link
                    .parameters
                    .iter()
                    .map(|(param, value)| (strip_location(param), SourceExpression::parse(value)))
                    .collect(),
                request_body: link.request_body.as_ref().map(SourceExpression::parse),
                description: link.description.clone(),
            })
        })
        .collect()
}

fn describe(
    method: HttpMethod,
    path: &str,
    shared: &[Parameter],
    op: &Operation,
    document_security: &[String],
) -> OperationDescriptor {
    let (operation_id, explicit_id) = match op.operation_id.as_deref() {
        Some(id) if !id.trim().is_empty() => (id.to_string(), true),
        _ => (derive_operation_id(method, path), false),
    };

    let request_body = op.request_body.as_ref().and_then(|body| {
        let (content_type, media) = json_media_entry(&body.content)?;
        Some(BodyDescriptor {
            content_type: content_type.clone(),
            schema: media.schema.clone().unwrap_or_default(),
            required: body.required,
            description: body.description.clone(),
        })
    });

    let responses = op
        .responses
        .iter()
        .map(|(status, response)| ResponseDescriptor {
            status: status.clone(),
            description: response.description.clone(),
            schema: json_media_type(&response.content).and_then(|m| m.schema.clone()),
            links: collect_links(response),
        })
        .collect();

    let security = match &op.security {
        Some(requirements) => requirements
            .iter()
            .flat_map(|req| req.keys().cloned())
            .collect(),
        None => document_security.to_vec(),
    };

    OperationDescriptor {
        operation_id,
        explicit_id,
        method,
        path: path.to_string(),
        summary: op.summary.clone(),
        description: op.description.clone(),
        tags: op.tags.clone(),
        parameters: merge_parameters(shared, &op.parameters),
        request_body,
        responses,
        security,
        deprecated: op.deprecated,
    }
}

/// Collects every operation of `document` in document order.
#[must_use]
pub fn collect_operations(document: &OpenApiDocument) -> Vec<OperationDescriptor> {
    let document_security: Vec<String> = document
        .security
        .iter()
        .flat_map(|req| req.keys().cloned())
        .collect();

    document
        .paths
        .iter()
        .flat_map(|(path, item)| {
            let security = &document_security;
            item.operations()
                .map(move |(method, op)| describe(method, path, &item.parameters, op, security))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> OpenApiDocument {
        serde_json::from_value(json!({
            "openapi": "3.0.3",
            "info": {"title": "test", "version": "1"},
            "security": [{"bearerAuth": []}],
            "paths": {
                "/user/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "schema": {"type": "string"}},
                        {"name": "verbose", "in": "query", "schema": {"type": "boolean"}}
                    ],
                    "get": {
                        "parameters": [
                            {"name": "verbose", "in": "query", "required": true, "schema": {"type": "integer"}},
                            {"name": "session", "in": "cookie"}
                        ],
                        "responses": {
                            "404": {"description": "missing"},
                            "201": {
                                "description": "created",
                                "content": {"application/json": {"schema": {"type": "object"}}},
                                "links": {
                                    "company": {
                                        "operationId": "getCompany",
                                        "parameters": {"path.id": "$response.body#/companyId"}
                                    },
                                    "orphan": {"operationRef": "#/paths/x"}
                                }
                            },
                            "200": {"description": "ok"}
                        }
                    },
                    "put": {
                        "operationId": "replaceUser",
                        "security": [],
                        "requestBody": {
                            "content": {
                                "text/plain": {"schema": {"type": "string"}},
                                "application/json": {"schema": {"type": "object"}}
                            }
                        },
                        "responses": {"default": {"description": "any"}}
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_collect_operations_in_order() {
        let ops = collect_operations(&document());
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].method, HttpMethod::Get);
        assert_eq!(ops[0].operation_id, "getUserId");
        assert!(!ops[0].explicit_id);
        assert_eq!(ops[1].operation_id, "replaceUser");
        assert!(ops[1].explicit_id);
        assert!(ops[1].is_mutation());
    }

    #[test]
    fn test_parameters_merge_and_override() {
        let ops = collect_operations(&document());
        let get = &ops[0];
        assert_eq!(get.parameters.len(), 2);
        let verbose = get.find_parameter("query.verbose").unwrap();
        assert!(verbose.required);
        assert_eq!(verbose.schema.type_name(), Some("integer"));
        assert!(get.find_parameter("id").unwrap().required);
        assert!(get.find_parameter("session").is_none());
    }

    #[test]
    fn test_success_response_prefers_lowest_2xx() {
        let ops = collect_operations(&document());
        assert_eq!(ops[0].success_response().unwrap().status, "200");
        assert_eq!(ops[1].success_response().unwrap().status, "default");
    }

    #[test]
    fn test_links_are_parsed() {
        let ops = collect_operations(&document());
        let created = ops[0].responses.iter().find(|r| r.status == "201").unwrap();
        assert_eq!(created.links.len(), 1);
        let link = &created.links[0];
        assert_eq!(link.target_operation_id, "getCompany");
        assert_eq!(
            link.parameters.get("id"),
            Some(&SourceExpression::ResponseBody("/companyId".into()))
        );
    }

    #[test]
    fn test_security_inheritance() {
        let ops = collect_operations(&document());
        assert_eq!(ops[0].security, vec!["bearerAuth".to_string()]);
        assert!(ops[1].security.is_empty());
    }

    #[test]
    fn test_request_body_prefers_json() {
        let ops = collect_operations(&document());
        let body = ops[1].request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert!(body.schema.is_object());
    }
}
