//! Conversion between REST JSON payloads and GraphQL values.
//!
//! Output objects are carried through the dynamic schema as [`Node`]s: the
//! decoded JSON object plus the [`Origin`] of the call that produced it, which
//! link fields evaluate their expressions against.

use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue};
use async_graphql::{Context, Name, Number, Value};
use restgraph_openapi::RecordedExchange;
use serde_json::Value as JsonValue;

use super::graph::GraphType;
use super::types::{InputCatalog, InputShape, OutputShape, ScalarKind};
use super::viewer::Credentials;
use crate::error::BridgeError;

/// The call that produced a node.
#[derive(Debug)]
pub(crate) struct Origin {
    pub(crate) exchange: RecordedExchange,
    /// Viewer credentials in effect when the call was made.
    pub(crate) credentials: Option<Arc<Credentials>>,
}

/// A decoded JSON object resolved as a GraphQL object.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) value: JsonValue,
    pub(crate) origin: Arc<Origin>,
}

/// Coerces a JSON scalar to the representation of a GraphQL scalar.
///
/// Follows GraphQL result coercion: numbers and booleans serialize as
/// strings for `String`, numeric strings parse for `Int` and `Float`, and
/// `Int` is limited to 32 bits.
pub(crate) fn coerce_scalar(kind: ScalarKind, value: JsonValue) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match kind {
        ScalarKind::String => match value {
            JsonValue::String(s) => Ok(Value::String(s)),
            JsonValue::Number(n) => Ok(Value::String(n.to_string())),
            JsonValue::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("String cannot represent a non string value: {other}")),
        },
        ScalarKind::Int => {
            let number = match &value {
                JsonValue::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                }),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                JsonValue::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            number
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::from)
                .ok_or_else(|| format!("Int cannot represent non 32-bit signed integer value: {value}"))
        }
        ScalarKind::Float => {
            let number = match &value {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok(),
                JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            };
            number
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("Float cannot represent non numeric value: {value}"))
        }
        ScalarKind::Boolean => match value {
            JsonValue::Bool(b) => Ok(Value::Boolean(b)),
            JsonValue::Number(n) => Ok(Value::Boolean(n.as_f64().is_some_and(|f| f != 0.0))),
            other => Err(format!("Boolean cannot represent a non boolean value: {other}")),
        },
        ScalarKind::Json => Value::from_json(value).map_err(|e| e.to_string()),
    }
}

/// Converts decoded JSON into the field value for `shape`.
pub(crate) fn to_field_value<'a>(
    value: JsonValue,
    shape: &OutputShape,
    origin: &Arc<Origin>,
) -> Result<FieldValue<'a>, BridgeError> {
    if value.is_null() {
        return Ok(FieldValue::NULL);
    }
    match shape {
        OutputShape::Scalar(kind) => coerce_scalar(*kind, value)
            .map(FieldValue::value)
            .map_err(BridgeError::Decode),
        OutputShape::Enum(mapping) => {
            let name = mapping.graphql_name(&value).ok_or_else(|| {
                BridgeError::Decode(format!("{value} is not a value of enum {}", mapping.name))
            })?;
            Ok(FieldValue::value(Value::Enum(Name::new(name))))
        }
        OutputShape::Object(name) => {
            if !value.is_object() {
                return Err(BridgeError::Decode(format!(
                    "expected an object for {name}, got {value}"
                )));
            }
            Ok(FieldValue::owned_any(Node {
                value,
                origin: Arc::clone(origin),
            }))
        }
        OutputShape::List(inner) => match value {
            JsonValue::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| to_field_value(item, inner, origin))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FieldValue::list(items))
            }
            other => Err(BridgeError::Decode(format!("expected a list, got {other}"))),
        },
    }
}

/// Converts the body of an operation response.
///
/// Elements of a list response each become their own origin, so links on
/// the element type see the element as `$response.body`.
pub(crate) fn root_field_value<'a>(
    body: JsonValue,
    shape: &OutputShape,
    exchange: RecordedExchange,
    credentials: Option<Arc<Credentials>>,
) -> Result<FieldValue<'a>, BridgeError> {
    match (shape, body) {
        (OutputShape::List(inner), JsonValue::Array(items)) => {
            let values = items
                .into_iter()
                .map(|item| {
                    let origin = Arc::new(Origin {
                        exchange: RecordedExchange {
                            response_body: item.clone(),
                            ..exchange.clone()
                        },
                        credentials: credentials.clone(),
                    });
                    to_field_value(item, inner, &origin)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FieldValue::list(values))
        }
        (shape, body) => {
            let origin = Arc::new(Origin {
                exchange,
                credentials,
            });
            to_field_value(body, shape, &origin)
        }
    }
}

/// Converts an argument value to the JSON sent to the REST operation.
///
/// Enum names map back to their raw values and input fields back to their
/// original property names. Fields the caller did not supply are omitted.
pub(crate) fn const_to_json(
    value: &Value,
    shape: &InputShape,
    catalog: &InputCatalog,
) -> Result<JsonValue, BridgeError> {
    match (shape, value) {
        (_, Value::Null) => Ok(JsonValue::Null),
        (InputShape::Scalar(_), Value::Number(n)) => Ok(JsonValue::Number(n.clone())),
        (InputShape::Scalar(_), Value::String(s)) => Ok(JsonValue::String(s.clone())),
        (InputShape::Scalar(_), Value::Boolean(b)) => Ok(JsonValue::Bool(*b)),
        (InputShape::Scalar(_), other) => other.clone().into_json().map_err(|e| {
            BridgeError::InvalidArgument {
                argument: other.to_string(),
                message: e.to_string(),
            }
        }),
        (InputShape::Enum(mapping), Value::Enum(name)) => mapping
            .raw_value(name.as_str())
            .cloned()
            .ok_or_else(|| BridgeError::InvalidArgument {
                argument: mapping.name.clone(),
                message: format!("unknown enum value {name}"),
            }),
        (InputShape::Enum(mapping), Value::String(name)) => mapping
            .raw_value(name)
            .cloned()
            .ok_or_else(|| BridgeError::InvalidArgument {
                argument: mapping.name.clone(),
                message: format!("unknown enum value {name}"),
            }),
        (InputShape::List(inner), Value::List(items)) => items
            .iter()
            .map(|item| const_to_json(item, inner, catalog))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        (InputShape::List(inner), single) => {
            Ok(JsonValue::Array(vec![const_to_json(single, inner, catalog)?]))
        }
        (InputShape::Object(type_name), Value::Object(fields)) => {
            let bindings = catalog.get(type_name).ok_or_else(|| {
                BridgeError::Internal(format!("input type {type_name} is not registered"))
            })?;
            let mut object = serde_json::Map::new();
            for binding in bindings {
                if let Some(field) = fields.get(binding.graphql_name.as_str()) {
                    object.insert(
                        binding.raw_name.clone(),
                        const_to_json(field, &binding.shape, catalog)?,
                    );
                }
            }
            Ok(JsonValue::Object(object))
        }
        (shape, other) => Err(BridgeError::InvalidArgument {
            argument: other.to_string(),
            message: format!("value does not match {}", shape.describe()),
        }),
    }
}

/// Builds the resolver for one property of an object type.
pub(crate) fn property_field(
    graphql_name: &str,
    raw_name: &str,
    ty: &GraphType,
    shape: OutputShape,
) -> Field {
    let raw_name = raw_name.to_string();
    Field::new(graphql_name, ty.to_type_ref(), move |ctx| {
        let raw_name = raw_name.clone();
        let shape = shape.clone();
        FieldFuture::new(async move {
            let node = ctx.parent_value.try_downcast_ref::<Node>()?;
            let value = node.value.get(&raw_name).cloned().unwrap_or(JsonValue::Null);
            match to_field_value(value, &shape, &node.origin) {
                Ok(value) => Ok(Some(value)),
                Err(e) => null_with_error(ctx.ctx, &e),
            }
        })
    })
}

/// Records `error` at the current field's path and resolves the field to
/// `null`, so siblings keep their data.
pub(crate) fn null_with_error<'a>(
    ctx: &Context<'_>,
    error: &BridgeError,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let server_error = error.to_field_error().into_server_error(ctx.item.pos);
    ctx.add_error(ctx.set_error_path(server_error));
    Ok(None)
}
