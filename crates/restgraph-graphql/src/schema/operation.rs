//! Operation fields: GraphQL arguments in, REST call out.

use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, ObjectAccessor};
use indexmap::IndexMap;
use restgraph_openapi::{HttpMethod, OperationDescriptor, ParameterLocation, RecordedExchange};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::graph::{ArgumentDef, FieldDef, GraphType};
use super::types::{InputCatalog, InputShape, OutputShape};
use super::values::{const_to_json, null_with_error, root_field_value};
use super::viewer::{Credentials, ViewerNode};
use crate::adapter::{CallBody, CallResult, CallSpecification, Dispatcher};
use crate::context::RequestContext;
use crate::error::BridgeError;

/// Where an argument goes in the REST call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArgumentTarget {
    Parameter {
        location: ParameterLocation,
        name: String,
    },
    Body,
}

#[derive(Debug, Clone)]
pub(crate) struct ArgumentBinding {
    pub(crate) graphql_name: String,
    pub(crate) target: ArgumentTarget,
    pub(crate) shape: InputShape,
    pub(crate) ty: GraphType,
    pub(crate) description: Option<String>,
}

impl ArgumentBinding {
    pub(crate) fn input_value(&self) -> InputValue {
        let value = InputValue::new(self.graphql_name.as_str(), self.ty.to_type_ref());
        match &self.description {
            Some(description) => value.description(description),
            None => value,
        }
    }

    pub(crate) fn definition(&self) -> ArgumentDef {
        ArgumentDef::new(&self.graphql_name, &self.ty)
    }
}

/// Everything needed to resolve one operation field.
#[derive(Debug)]
pub(crate) struct OperationPlan {
    pub(crate) operation_id: String,
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) field_name: String,
    pub(crate) description: Option<String>,
    pub(crate) arguments: Vec<ArgumentBinding>,
    pub(crate) output: OutputShape,
    pub(crate) output_type: GraphType,
    /// Send `{}` when no body argument is given.
    pub(crate) default_body: bool,
}

impl OperationPlan {
    pub(crate) fn is_mutation(&self) -> bool {
        self.method.is_mutation()
    }

    /// Finds the argument bound to a parameter.
    pub(crate) fn parameter_argument(
        &self,
        location: ParameterLocation,
        name: &str,
    ) -> Option<&ArgumentBinding> {
        self.arguments.iter().find(|arg| {
            matches!(&arg.target, ArgumentTarget::Parameter { location: l, name: n } if *l == location && n == name)
        })
    }

    pub(crate) fn body_argument(&self) -> Option<&ArgumentBinding> {
        self.arguments
            .iter()
            .find(|arg| arg.target == ArgumentTarget::Body)
    }
}

/// Argument values for one call, keyed by parameter.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArguments {
    pub(crate) params: IndexMap<(ParameterLocation, String), JsonValue>,
    pub(crate) body: Option<JsonValue>,
}

/// Resolves an operation by dispatching its REST call.
pub(crate) struct OperationInvoker {
    pub(crate) plan: OperationPlan,
    dispatcher: Arc<Dispatcher>,
    inputs: Arc<InputCatalog>,
}

impl OperationInvoker {
    pub(crate) fn new(
        plan: OperationPlan,
        dispatcher: Arc<Dispatcher>,
        inputs: Arc<InputCatalog>,
    ) -> Self {
        Self {
            plan,
            dispatcher,
            inputs,
        }
    }

    /// Reads the given argument bindings from a field's arguments.
    pub(crate) fn collect_arguments<'b>(
        &self,
        args: &ObjectAccessor<'_>,
        bindings: impl IntoIterator<Item = &'b ArgumentBinding>,
    ) -> Result<CallArguments, BridgeError> {
        let mut collected = CallArguments::default();
        for binding in bindings {
            let Some(value) = args.get(&binding.graphql_name) else {
                continue;
            };
            let json = const_to_json(value.as_value(), &binding.shape, &self.inputs)?;
            match &binding.target {
                ArgumentTarget::Parameter { location, name } => {
                    if !json.is_null() {
                        collected.params.insert((*location, name.clone()), json);
                    }
                }
                ArgumentTarget::Body => collected.body = Some(json),
            }
        }
        Ok(collected)
    }

    /// Builds the call for `args`.
    pub(crate) fn build_call(
        &self,
        args: &CallArguments,
        credentials: Option<&Credentials>,
    ) -> Result<CallSpecification, BridgeError> {
        let path = expand_path(&self.plan.path, args, &self.plan.operation_id)?;
        let mut call = CallSpecification::new(self.plan.method, path);

        for ((location, name), value) in &args.params {
            match location {
                ParameterLocation::Query => append_query_value(&mut call, name, value),
                ParameterLocation::Header => call.set_header(name, &scalar_text(value))?,
                ParameterLocation::Path | ParameterLocation::Cookie => {}
            }
        }

        call.body = match &args.body {
            Some(body) if !body.is_null() => Some(CallBody::Json(body.clone())),
            _ if self.plan.default_body => Some(CallBody::Json(JsonValue::Object(
                serde_json::Map::new(),
            ))),
            _ => None,
        };

        if let Some(credentials) = credentials {
            credentials.apply(&mut call)?;
        }
        Ok(call)
    }

    /// Dispatches the call and decodes the response.
    pub(crate) async fn invoke<'v>(
        &self,
        args: CallArguments,
        context: &RequestContext,
        credentials: Option<Arc<Credentials>>,
    ) -> Result<FieldValue<'v>, BridgeError> {
        let call = self.build_call(&args, credentials.as_deref())?;
        let url = call.path_and_query.clone();
        let request_body = match &call.body {
            Some(CallBody::Json(body)) => Some(body.clone()),
            _ => None,
        };

        debug!(
            operation_id = %self.plan.operation_id,
            field = %self.plan.field_name,
            method = %self.plan.method,
            url = %url,
            "Resolving operation field"
        );
        let result = self.dispatcher.send(call, context).await?;

        if !result.is_success() {
            return Err(BridgeError::Dispatch {
                status: result.status,
                status_text: result.status_text.clone(),
                body: result.body_value(),
            });
        }

        let body = if result.body.is_empty() {
            JsonValue::Null
        } else {
            match serde_json::from_slice::<JsonValue>(&result.body) {
                Ok(body) => body,
                Err(_) if self.plan.output.accepts_text() => JsonValue::String(result.text()),
                Err(e) => {
                    return Err(BridgeError::Decode(format!(
                        "{} returned invalid JSON: {e}",
                        self.plan.operation_id
                    )));
                }
            }
        };

        let exchange = record_exchange(&self.plan, args, url, request_body, &result, body.clone());
        root_field_value(body, &self.plan.output, exchange, credentials)
    }

    /// Builds the GraphQL field for this operation.
    pub(crate) fn field(self: &Arc<Self>) -> (FieldDef, Field) {
        let invoker = Arc::clone(self);
        let mut field = Field::new(
            self.plan.field_name.as_str(),
            self.plan.output_type.to_type_ref(),
            move |ctx| {
                let invoker = Arc::clone(&invoker);
                FieldFuture::new(async move {
                    let context = ctx
                        .ctx
                        .data_opt::<RequestContext>()
                        .cloned()
                        .unwrap_or_default();
                    let credentials = ctx
                        .parent_value
                        .downcast_ref::<ViewerNode>()
                        .map(|viewer| Arc::clone(&viewer.credentials));
                    let resolved = match invoker
                        .collect_arguments(&ctx.args, &invoker.plan.arguments)
                    {
                        Ok(args) => invoker.invoke(args, &context, credentials).await,
                        Err(e) => Err(e),
                    };
                    match resolved {
                        Ok(value) => Ok(Some(value)),
                        Err(e) => null_with_error(ctx.ctx, &e),
                    }
                })
            },
        );
        if let Some(description) = &self.plan.description {
            field = field.description(description);
        }
        for argument in &self.plan.arguments {
            field = field.argument(argument.input_value());
        }

        let def = FieldDef::new(&self.plan.field_name, &self.plan.output_type).with_arguments(
            self.plan
                .arguments
                .iter()
                .map(ArgumentBinding::definition)
                .collect(),
        );
        (def, field)
    }
}

/// Field description for an operation.
pub(crate) fn describe(descriptor: &OperationDescriptor) -> Option<String> {
    descriptor
        .summary
        .clone()
        .or_else(|| descriptor.description.clone())
}

fn record_exchange(
    plan: &OperationPlan,
    args: CallArguments,
    url: String,
    request_body: Option<JsonValue>,
    result: &CallResult,
    response_body: JsonValue,
) -> RecordedExchange {
    let mut exchange = RecordedExchange {
        method: plan.method.as_str().to_string(),
        url,
        status: result.status,
        request_body,
        response_body,
        ..RecordedExchange::default()
    };
    for ((location, name), value) in args.params {
        match location {
            ParameterLocation::Path => {
                exchange.path.insert(name, value);
            }
            ParameterLocation::Query => {
                exchange.query.insert(name, value);
            }
            ParameterLocation::Header => {
                exchange.headers.insert(name.to_ascii_lowercase(), value);
            }
            ParameterLocation::Cookie => {}
        }
    }
    for (name, value) in &result.headers {
        if let Ok(value) = value.to_str() {
            exchange
                .response_headers
                .insert(name.as_str().to_string(), value.to_string());
        }
    }
    exchange
}

/// Substitutes `{name}` segments of a path template.
fn expand_path(
    template: &str,
    args: &CallArguments,
    operation_id: &str,
) -> Result<String, BridgeError> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        path.push_str(&rest[..start]);
        let name = &rest[start + 1..start + len];
        let value = args
            .params
            .get(&(ParameterLocation::Path, name.to_string()))
            .ok_or_else(|| BridgeError::MissingArgument {
                operation: operation_id.to_string(),
                argument: name.to_string(),
            })?;
        path.push_str(&urlencoding::encode(&scalar_text(value)));
        rest = &rest[start + len + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

/// Serializes a query value: arrays repeat the key, objects use `key[sub]`.
fn append_query_value(call: &mut CallSpecification, name: &str, value: &JsonValue) {
    match value {
        JsonValue::Null => {}
        JsonValue::Array(items) => {
            for item in items {
                append_query_value(call, name, item);
            }
        }
        JsonValue::Object(fields) => {
            for (key, item) in fields {
                append_query_value(call, &format!("{name}[{key}]"), item);
            }
        }
        scalar => call.append_query(name, &scalar_text(scalar)),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
