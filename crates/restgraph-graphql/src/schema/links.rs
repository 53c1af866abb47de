//! Link fields.
//!
//! A link field sits on the output type of the triggering operation. It
//! evaluates its parameter expressions against the [`Origin`] of the parent
//! node and delegates to the target operation's invoker. Expressions are
//! only evaluated at query time, so a missing value fails the link field and
//! nothing else.

use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, ObjectAccessor};
use restgraph_openapi::{LinkDescriptor, ParameterLocation, SourceExpression};
use tracing::trace;

use super::graph::FieldDef;
use super::operation::{ArgumentBinding, ArgumentTarget, CallArguments, OperationInvoker};
use super::values::{Node, Origin, null_with_error};
use crate::context::RequestContext;
use crate::error::BridgeError;

#[derive(Debug, Clone)]
struct LinkBinding {
    location: ParameterLocation,
    name: String,
    expression: SourceExpression,
}

/// A link bound to its target operation.
pub(crate) struct LinkPlan {
    field_name: String,
    link_name: String,
    description: Option<String>,
    target: Arc<OperationInvoker>,
    bindings: Vec<LinkBinding>,
    body: Option<SourceExpression>,
    /// Target arguments the link does not supply.
    extra: Vec<ArgumentBinding>,
}

impl LinkPlan {
    /// Binds `link` to `target`.
    ///
    /// Returns the plan and the link parameters that name no parameter of
    /// the target operation.
    pub(crate) fn new(
        field_name: String,
        link: &LinkDescriptor,
        target: Arc<OperationInvoker>,
    ) -> (Self, Vec<String>) {
        let mut bindings = Vec::new();
        let mut unknown = Vec::new();
        for (name, expression) in &link.parameters {
            let parameter = target.plan.arguments.iter().find_map(|arg| match &arg.target {
                ArgumentTarget::Parameter { location, name: raw } if raw == name => {
                    Some(*location)
                }
                _ => None,
            });
            match parameter {
                Some(location) => bindings.push(LinkBinding {
                    location,
                    name: name.clone(),
                    expression: expression.clone(),
                }),
                None => unknown.push(name.clone()),
            }
        }

        let body = link
            .request_body
            .clone()
            .filter(|_| target.plan.body_argument().is_some());

        let extra = target
            .plan
            .arguments
            .iter()
            .filter(|arg| match &arg.target {
                ArgumentTarget::Parameter { location, name } => !bindings
                    .iter()
                    .any(|b| b.location == *location && &b.name == name),
                ArgumentTarget::Body => body.is_none(),
            })
            .cloned()
            .collect();

        let plan = Self {
            field_name,
            link_name: link.name.clone(),
            description: link.description.clone(),
            target,
            bindings,
            body,
            extra,
        };
        (plan, unknown)
    }

    fn arguments(
        &self,
        origin: &Origin,
        args: &ObjectAccessor<'_>,
    ) -> Result<CallArguments, BridgeError> {
        let mut collected = self.target.collect_arguments(args, &self.extra)?;
        for binding in &self.bindings {
            let value = binding
                .expression
                .evaluate(&origin.exchange)
                .map_err(|e| BridgeError::link(&self.link_name, &e))?;
            collected
                .params
                .insert((binding.location, binding.name.clone()), value);
        }
        if let Some(expression) = &self.body {
            let value = expression
                .evaluate(&origin.exchange)
                .map_err(|e| BridgeError::link(&self.link_name, &e))?;
            collected.body = Some(value);
        }
        Ok(collected)
    }

    /// Builds the link field.
    pub(crate) fn field(self: Arc<Self>) -> (FieldDef, Field) {
        let ty = self.target.plan.output_type.clone();
        let plan = Arc::clone(&self);
        let mut field = Field::new(self.field_name.as_str(), ty.to_type_ref(), move |ctx| {
            let plan = Arc::clone(&plan);
            FieldFuture::new(async move {
                let node = ctx.parent_value.try_downcast_ref::<Node>()?;
                let context = ctx
                    .ctx
                    .data_opt::<RequestContext>()
                    .cloned()
                    .unwrap_or_default();
                trace!(
                    link = %plan.link_name,
                    target = %plan.target.plan.operation_id,
                    "Resolving link"
                );
                let resolved = match plan.arguments(&node.origin, &ctx.args) {
                    Ok(args) => {
                        plan.target
                            .invoke(args, &context, node.origin.credentials.clone())
                            .await
                    }
                    Err(e) => Err(e),
                };
                match resolved {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => null_with_error(ctx.ctx, &e),
                }
            })
        });

        if let Some(description) = &self.description {
            field = field.description(description);
        }
        for argument in &self.extra {
            field = field.argument(argument.input_value());
        }
        let def = FieldDef::new(&self.field_name, &ty)
            .with_arguments(self.extra.iter().map(ArgumentBinding::definition).collect());
        (def, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Dispatcher;
    use crate::adapter::InProcessAdapter;
    use crate::schema::graph::GraphType;
    use crate::schema::operation::OperationPlan;
    use crate::schema::types::{InputCatalog, InputShape, OutputShape, ScalarKind};
    use indexmap::IndexMap;
    use restgraph_openapi::{HttpMethod, RecordedExchange};
    use serde_json::json;

    fn target() -> Arc<OperationInvoker> {
        let argument = |name: &str, location| ArgumentBinding {
            graphql_name: name.to_string(),
            target: ArgumentTarget::Parameter {
                location,
                name: name.to_string(),
            },
            shape: InputShape::Scalar(ScalarKind::String),
            ty: GraphType::named("String"),
            description: None,
        };
        let plan = OperationPlan {
            operation_id: "getCompany".into(),
            method: HttpMethod::Get,
            path: "/company/{id}".into(),
            field_name: "getCompany".into(),
            description: None,
            arguments: vec![
                argument("id", ParameterLocation::Path),
                argument("fields", ParameterLocation::Query),
            ],
            output: OutputShape::Scalar(ScalarKind::Json),
            output_type: GraphType::named("JSON"),
            default_body: false,
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(InProcessAdapter::new(
            axum::Router::new(),
        ))));
        Arc::new(OperationInvoker::new(
            plan,
            dispatcher,
            Arc::new(InputCatalog::new()),
        ))
    }

    fn link(parameters: &[(&str, SourceExpression)]) -> LinkDescriptor {
        LinkDescriptor {
            name: "company".into(),
            target_operation_id: "getCompany".into(),
            parameters: parameters
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<IndexMap<_, _>>(),
            request_body: None,
            description: None,
        }
    }

    #[test]
    fn test_bound_parameters_are_not_arguments() {
        let (plan, unknown) = LinkPlan::new(
            "company".into(),
            &link(&[
                ("id", SourceExpression::ResponseBody("/companyId".into())),
                ("nope", SourceExpression::StatusCode),
            ]),
            target(),
        );
        assert_eq!(unknown, vec!["nope".to_string()]);
        let extra: Vec<_> = plan.extra.iter().map(|a| a.graphql_name.as_str()).collect();
        assert_eq!(extra, vec!["fields"]);

        let (def, _) = Arc::new(plan).field();
        assert_eq!(def.name, "company");
        assert_eq!(def.arguments.len(), 1);
    }

    #[test]
    fn test_link_arguments_from_origin() {
        let (plan, _) = LinkPlan::new(
            "company".into(),
            &link(&[("id", SourceExpression::RequestPath("id".into()))]),
            target(),
        );
        let mut exchange = RecordedExchange::default();
        exchange.path.insert("id".into(), json!("foo42"));
        let origin = Origin {
            exchange,
            credentials: None,
        };

        let mut bound = CallArguments::default();
        for binding in &plan.bindings {
            bound.params.insert(
                (binding.location, binding.name.clone()),
                binding.expression.evaluate(&origin.exchange).unwrap(),
            );
        }
        assert_eq!(
            bound.params[&(ParameterLocation::Path, "id".to_string())],
            json!("foo42")
        );

        let missing = Origin {
            exchange: RecordedExchange::default(),
            credentials: None,
        };
        let err = plan.bindings[0]
            .expression
            .evaluate(&missing.exchange)
            .map_err(|e| BridgeError::link(&plan.link_name, &e))
            .unwrap_err();
        assert_eq!(err.error_code(), "LINK_RESOLUTION_FAILED");
    }
}
