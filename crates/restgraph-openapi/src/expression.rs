//! OpenAPI runtime expressions used by link parameters.
//!
//! Expressions are parsed once when descriptors are collected and evaluated
//! per request against a [`RecordedExchange`]. Parsing never fails: anything
//! that is not understood is kept as [`SourceExpression::Invalid`] and only
//! reports an error when a query actually evaluates it.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// A link parameter source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceExpression {
    /// `$request.path.<name>`
    RequestPath(String),
    /// `$request.query.<name>`
    RequestQuery(String),
    /// `$request.header.<name>`
    RequestHeader(String),
    /// `$request.body#<pointer>`
    RequestBody(String),
    /// `$response.body#<pointer>`
    ResponseBody(String),
    /// `$response.header.<name>`
    ResponseHeader(String),
    /// `$statusCode`
    StatusCode,
    /// `$method`
    Method,
    /// `$url`
    Url,
    /// Constant value.
    Literal(JsonValue),
    /// Unparseable expression, kept so evaluation can report it.
    Invalid { expression: String, reason: String },
}

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("request {location} argument '{name}' was not supplied")]
    MissingArgument { location: &'static str, name: String },

    #[error("request body was not supplied")]
    MissingRequestBody,

    #[error("JSON pointer '{pointer}' did not match the {target} body")]
    MissingPointer { target: &'static str, pointer: String },

    #[error("response header '{0}' is absent")]
    MissingHeader(String),

    #[error("invalid runtime expression '{expression}': {reason}")]
    Invalid { expression: String, reason: String },
}

/// Everything a link expression can observe about the triggering call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedExchange {
    /// Upper-case HTTP method.
    pub method: String,
    /// Dispatched path and query string.
    pub url: String,
    pub status: u16,
    /// Path arguments keyed by parameter name.
    pub path: IndexMap<String, JsonValue>,
    /// Query arguments keyed by parameter name.
    pub query: IndexMap<String, JsonValue>,
    /// Header arguments keyed by lower-case header name.
    pub headers: IndexMap<String, JsonValue>,
    pub request_body: Option<JsonValue>,
    pub response_body: JsonValue,
    /// Response headers keyed by lower-case name.
    pub response_headers: IndexMap<String, String>,
}

fn parse_pointer(expression: &str, rest: &str) -> SourceExpressionResult {
    match rest {
        "" => Ok(String::new()),
        _ => match rest.strip_prefix('#') {
            Some(ptr) if ptr.is_empty() || ptr.starts_with('/') => Ok(ptr.to_string()),
            _ => Err(SourceExpression::Invalid {
                expression: expression.to_string(),
                reason: "body references must be followed by '#/<pointer>'".to_string(),
            }),
        },
    }
}

type SourceExpressionResult = Result<String, SourceExpression>;

fn named(expression: &str, rest: &str, ctor: fn(String) -> SourceExpression) -> SourceExpression {
    match rest.strip_prefix('.') {
        Some(name) if !name.is_empty() => ctor(name.to_string()),
        _ => SourceExpression::Invalid {
            expression: expression.to_string(),
            reason: "missing name".to_string(),
        },
    }
}

impl SourceExpression {
    /// Parses a link parameter value.
    #[must_use]
    pub fn parse(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(text) => Self::parse_str(text),
            other => Self::Literal(other.clone()),
        }
    }

    /// Parses an expression string; strings not starting with `$` are literals.
    #[must_use]
    pub fn parse_str(text: &str) -> Self {
        let trimmed = text.trim();
        // `{$request.path.id}` is the embedded form of the same expression.
        let expr = trimmed
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .filter(|t| t.starts_with('$'))
            .unwrap_or(trimmed);

        if !expr.starts_with('$') {
            return Self::Literal(JsonValue::String(text.to_string()));
        }

        match expr {
            "$statusCode" => return Self::StatusCode,
            "$method" => return Self::Method,
            "$url" => return Self::Url,
            _ => {}
        }

        if let Some(rest) = expr.strip_prefix("$request.") {
            if let Some(rest) = rest.strip_prefix("path") {
                return named(expr, rest, Self::RequestPath);
            }
            if let Some(rest) = rest.strip_prefix("query") {
                return named(expr, rest, Self::RequestQuery);
            }
            if let Some(rest) = rest.strip_prefix("header") {
                return named(expr, rest, |n| Self::RequestHeader(n.to_ascii_lowercase()));
            }
            if let Some(rest) = rest.strip_prefix("body") {
                return parse_pointer(expr, rest).map_or_else(|e| e, Self::RequestBody);
            }
        } else if let Some(rest) = expr.strip_prefix("$response.") {
            if let Some(rest) = rest.strip_prefix("body") {
                return parse_pointer(expr, rest).map_or_else(|e| e, Self::ResponseBody);
            }
            if let Some(rest) = rest.strip_prefix("header") {
                return named(expr, rest, |n| Self::ResponseHeader(n.to_ascii_lowercase()));
            }
        }

        Self::Invalid {
            expression: text.to_string(),
            reason: "unsupported source".to_string(),
        }
    }

    /// Returns true for expressions that read the response.
    #[must_use]
    pub fn reads_response(&self) -> bool {
        matches!(
            self,
            Self::ResponseBody(_) | Self::ResponseHeader(_) | Self::StatusCode
        )
    }

    /// Evaluates the expression against a recorded exchange.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] when the referenced argument, header or
    /// pointer target does not exist, or when the expression is invalid.
    pub fn evaluate(&self, exchange: &RecordedExchange) -> Result<JsonValue, ExpressionError> {
        match self {
            Self::RequestPath(name) => lookup(&exchange.path, "path", name),
            Self::RequestQuery(name) => lookup(&exchange.query, "query", name),
            Self::RequestHeader(name) => lookup(&exchange.headers, "header", name),
            Self::RequestBody(pointer) => {
                let body = exchange
                    .request_body
                    .as_ref()
                    .ok_or(ExpressionError::MissingRequestBody)?;
                resolve_pointer(body, "request", pointer)
            }
            Self::ResponseBody(pointer) => {
                resolve_pointer(&exchange.response_body, "response", pointer)
            }
            Self::ResponseHeader(name) => exchange
                .response_headers
                .get(name)
                .map(|v| JsonValue::String(v.clone()))
                .ok_or_else(|| ExpressionError::MissingHeader(name.clone())),
            Self::StatusCode => Ok(JsonValue::from(exchange.status)),
            Self::Method => Ok(JsonValue::String(exchange.method.clone())),
            Self::Url => Ok(JsonValue::String(exchange.url.clone())),
            Self::Literal(value) => Ok(value.clone()),
            Self::Invalid { expression, reason } => Err(ExpressionError::Invalid {
                expression: expression.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

fn lookup(
    args: &IndexMap<String, JsonValue>,
    location: &'static str,
    name: &str,
) -> Result<JsonValue, ExpressionError> {
    match args.get(name) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(ExpressionError::MissingArgument {
            location,
            name: name.to_string(),
        }),
    }
}

fn resolve_pointer(
    body: &JsonValue,
    target: &'static str,
    pointer: &str,
) -> Result<JsonValue, ExpressionError> {
    match body.pointer(pointer) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(ExpressionError::MissingPointer {
            target,
            pointer: pointer.to_string(),
        }),
    }
}

impl fmt::Display for SourceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestPath(name) => write!(f, "$request.path.{name}"),
            Self::RequestQuery(name) => write!(f, "$request.query.{name}"),
            Self::RequestHeader(name) => write!(f, "$request.header.{name}"),
            Self::RequestBody(ptr) if ptr.is_empty() => write!(f, "$request.body"),
            Self::RequestBody(ptr) => write!(f, "$request.body#{ptr}"),
            Self::ResponseBody(ptr) if ptr.is_empty() => write!(f, "$response.body"),
            Self::ResponseBody(ptr) => write!(f, "$response.body#{ptr}"),
            Self::ResponseHeader(name) => write!(f, "$response.header.{name}"),
            Self::StatusCode => write!(f, "$statusCode"),
            Self::Method => write!(f, "$method"),
            Self::Url => write!(f, "$url"),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Invalid { expression, .. } => write!(f, "{expression}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exchange() -> RecordedExchange {
        let mut path = IndexMap::new();
        path.insert("id".to_string(), json!("foo42"));
        RecordedExchange {
            method: "GET".into(),
            url: "/user/foo42".into(),
            status: 200,
            path,
            response_body: json!({"name": "foo", "companyId": 42, "tags": ["a", "b"]}),
            ..RecordedExchange::default()
        }
    }

    #[test]
    fn test_parse_request_and_response_sources() {
        assert_eq!(
            SourceExpression::parse_str("$request.path.id"),
            SourceExpression::RequestPath("id".into())
        );
        assert_eq!(
            SourceExpression::parse_str("$request.query.page"),
            SourceExpression::RequestQuery("page".into())
        );
        assert_eq!(
            SourceExpression::parse_str("$response.body#/companyId"),
            SourceExpression::ResponseBody("/companyId".into())
        );
        assert_eq!(
            SourceExpression::parse_str("$request.header.X-Tenant"),
            SourceExpression::RequestHeader("x-tenant".into())
        );
        assert_eq!(
            SourceExpression::parse_str("{$statusCode}"),
            SourceExpression::StatusCode
        );
    }

    #[test]
    fn test_non_expression_strings_are_literals() {
        assert_eq!(
            SourceExpression::parse(&json!("fixed")),
            SourceExpression::Literal(json!("fixed"))
        );
        assert_eq!(
            SourceExpression::parse(&json!(7)),
            SourceExpression::Literal(json!(7))
        );
    }

    #[test]
    fn test_malformed_expressions_are_kept() {
        let expr = SourceExpression::parse_str("$response.body/companyId");
        assert!(matches!(expr, SourceExpression::Invalid { .. }));
        assert!(expr.evaluate(&exchange()).is_err());

        let expr = SourceExpression::parse_str("$request.cookie.session");
        assert!(matches!(expr, SourceExpression::Invalid { .. }));
    }

    #[test]
    fn test_evaluate_against_exchange() {
        let ex = exchange();
        assert_eq!(
            SourceExpression::RequestPath("id".into()).evaluate(&ex).unwrap(),
            json!("foo42")
        );
        assert_eq!(
            SourceExpression::ResponseBody("/companyId".into())
                .evaluate(&ex)
                .unwrap(),
            json!(42)
        );
        assert_eq!(
            SourceExpression::ResponseBody("/tags/1".into())
                .evaluate(&ex)
                .unwrap(),
            json!("b")
        );
        assert_eq!(SourceExpression::StatusCode.evaluate(&ex).unwrap(), json!(200));
    }

    #[test]
    fn test_evaluate_missing_values() {
        let ex = exchange();
        assert_eq!(
            SourceExpression::RequestQuery("page".into()).evaluate(&ex),
            Err(ExpressionError::MissingArgument {
                location: "query",
                name: "page".into()
            })
        );
        assert!(matches!(
            SourceExpression::ResponseBody("/missing".into()).evaluate(&ex),
            Err(ExpressionError::MissingPointer { .. })
        ));
        assert_eq!(
            SourceExpression::RequestBody(String::new()).evaluate(&ex),
            Err(ExpressionError::MissingRequestBody)
        );
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "$request.path.id",
            "$response.body#/companyId",
            "$response.body",
            "$url",
        ] {
            assert_eq!(SourceExpression::parse_str(text).to_string(), text);
        }
    }
}
