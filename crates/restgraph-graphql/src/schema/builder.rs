//! GraphQL schema synthesis from an OpenAPI document.
//!
//! `SchemaSynthesizer` turns the finalized OpenAPI document into a dynamic
//! async-graphql schema. Synthesis runs in four passes over the operations,
//! always in document order:
//!
//! 1. Field names and argument/output types (the [`TypeRegistry`] dedupes
//!    structurally identical schemas)
//! 2. One invoker per operation, bound to the shared [`Dispatcher`]
//! 3. Link fields on the output types of the triggering operations
//! 4. Root objects, with secured operations grouped under viewers when
//!    enabled
//!
//! # Example
//!
//! ```ignore
//! let synthesizer = SchemaSynthesizer::new(dispatcher, SynthesisOptions::default());
//! let synthesized = synthesizer.synthesize(&document)?;
//! println!("{}", synthesized.schema.sdl());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_graphql::Value;
use async_graphql::dynamic::{Field, FieldFuture, Object, Schema, SchemaBuilder, TypeRef};
use indexmap::IndexMap;
use restgraph_openapi::naming::{UniqueNames, pascal_case, sanitize_identifier};
use restgraph_openapi::{
    OpenApiDocument, OperationDescriptor, ParameterLocation, collect_operations,
};
use tracing::{debug, info, warn};

use super::graph::{FieldDef, GraphType, SchemaGraph};
use super::links::LinkPlan;
use super::operation::{ArgumentBinding, ArgumentTarget, OperationInvoker, OperationPlan, describe};
use super::types::{LinkSlot, TypeRegistry};
use super::viewer::{ViewerScheme, viewer_field};
use crate::adapter::Dispatcher;
use crate::error::BridgeError;

/// Name of the field served when no query operation exists.
pub const PLACEHOLDER_FIELD: &str = "_placeholder";

/// Query engine limits applied to every synthesized schema.
#[derive(Debug, Clone)]
pub struct SchemaLimits {
    /// Maximum query depth allowed.
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    pub max_complexity: usize,

    /// Whether to enable introspection queries.
    pub introspection: bool,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_depth: 15,
            max_complexity: 500,
            introspection: true,
        }
    }
}

/// Options controlling synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Group secured operations under viewer fields.
    pub viewer: bool,

    /// Expose operations marked `deprecated`.
    pub include_deprecated: bool,

    pub limits: SchemaLimits,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            viewer: false,
            include_deprecated: true,
            limits: SchemaLimits::default(),
        }
    }
}

/// Output of a synthesis pass.
pub struct Synthesized {
    pub schema: Schema,
    pub graph: SchemaGraph,
    /// Links and fields dropped during synthesis.
    pub diagnostics: Vec<String>,
}

/// Builds GraphQL schemas from OpenAPI documents.
pub struct SchemaSynthesizer {
    dispatcher: Arc<Dispatcher>,
    options: SynthesisOptions,
}

#[derive(Default)]
struct ViewerGroup {
    scheme: Option<ViewerScheme>,
    query: Vec<(FieldDef, Field)>,
    mutation: Vec<(FieldDef, Field)>,
}

impl SchemaSynthesizer {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, options: SynthesisOptions) -> Self {
        Self {
            dispatcher,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Synthesizes a schema from `document`.
    ///
    /// A document without operations yields the placeholder schema.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SynthesisFailed`] if the document declares
    /// operations but none of them can be exposed, or if the schema engine
    /// rejects the result.
    pub fn synthesize(&self, document: &OpenApiDocument) -> Result<Synthesized, BridgeError> {
        let started = Instant::now();
        let descriptors = collect_operations(document);
        if descriptors.is_empty() {
            info!("OpenAPI document declares no operations, using placeholder schema");
            return Ok(Synthesized {
                schema: placeholder_schema(&self.options.limits)?,
                graph: placeholder_graph(),
                diagnostics: Vec::new(),
            });
        }

        let declared = descriptors.len();
        let operations: Vec<OperationDescriptor> = descriptors
            .into_iter()
            .filter(|op| self.is_exposed(op))
            .collect();
        if operations.is_empty() {
            return Err(BridgeError::SynthesisFailed(format!(
                "none of the {declared} declared operations can be exposed"
            )));
        }

        let mut diagnostics = Vec::new();
        let mut known: HashMap<&str, usize> = HashMap::new();
        for (index, op) in operations.iter().enumerate() {
            if known.contains_key(op.operation_id.as_str()) {
                warn!(operation_id = %op.operation_id, "Duplicate operationId");
                diagnostics.push(format!(
                    "operationId '{}' is declared more than once, links target the first",
                    op.operation_id
                ));
            } else {
                known.insert(op.operation_id.as_str(), index);
            }
        }

        // Pass 1: names and types
        let mut types = TypeRegistry::new(document);
        let mut field_names = UniqueNames::default();
        let plans: Vec<OperationPlan> = operations
            .iter()
            .map(|op| {
                let field_name = field_names.allocate(&sanitize_identifier(&op.operation_id));
                plan_operation(&mut types, op, field_name, links_key(op, &known))
            })
            .collect();

        // Pass 2: invokers
        let inputs = Arc::new(types.input_catalog());
        let invokers: Vec<Arc<OperationInvoker>> = plans
            .into_iter()
            .map(|plan| {
                Arc::new(OperationInvoker::new(
                    plan,
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&inputs),
                ))
            })
            .collect();

        // Pass 3: links
        for (op, invoker) in operations.iter().zip(&invokers) {
            attach_links(&mut types, op, invoker, &invokers, &known, &mut diagnostics);
        }

        // Pass 4: roots
        let mut query_fields = Vec::new();
        let mut mutation_fields = Vec::new();
        let mut viewers: IndexMap<String, ViewerGroup> = IndexMap::new();
        for (op, invoker) in operations.iter().zip(&invokers) {
            let entry = invoker.field();
            let secured_by = if self.options.viewer {
                viewer_scheme(document, op)
            } else {
                None
            };
            match secured_by {
                Some((scheme_name, scheme)) => {
                    let group = viewers.entry(scheme_name).or_default();
                    group.scheme = Some(scheme);
                    if op.is_mutation() {
                        group.mutation.push(entry);
                    } else {
                        group.query.push(entry);
                    }
                }
                None if op.is_mutation() => mutation_fields.push(entry),
                None => query_fields.push(entry),
            }
        }

        for (scheme_name, group) in viewers {
            let Some(scheme) = group.scheme else {
                continue;
            };
            let suffix = pascal_case(&scheme_name);
            let description = format!("Operations secured by the {scheme_name} scheme");
            if !group.query.is_empty() {
                let type_name = types.allocate_name(&format!("Viewer{suffix}"));
                let field_name = field_names.allocate(&format!("viewer{suffix}"));
                types.add_object(&type_name, Some(&description), group.query);
                query_fields.push(viewer_field(&field_name, &type_name, &scheme_name, &scheme));
            }
            if !group.mutation.is_empty() {
                let type_name = types.allocate_name(&format!("MutationViewer{suffix}"));
                let field_name = field_names.allocate(&format!("mutationViewer{suffix}"));
                types.add_object(&type_name, Some(&description), group.mutation);
                mutation_fields.push(viewer_field(&field_name, &type_name, &scheme_name, &scheme));
            }
        }

        if query_fields.is_empty() {
            query_fields.push(placeholder_field());
        }

        let mut graph = SchemaGraph::default();
        let has_mutation = !mutation_fields.is_empty();
        let mut builder = Schema::build("Query", has_mutation.then_some("Mutation"), None);
        builder = types.register(builder, &mut graph);

        let (query, query_defs) = root_object("Query", query_fields);
        builder = builder.register(query);
        graph.query = query_defs;
        if has_mutation {
            let (mutation, mutation_defs) = root_object("Mutation", mutation_fields);
            builder = builder.register(mutation);
            graph.mutation = mutation_defs;
        }

        let schema = apply_limits(builder, &self.options.limits)
            .finish()
            .map_err(|e| BridgeError::SynthesisFailed(e.to_string()))?;

        info!(
            operations = operations.len(),
            query_fields = graph.query.len(),
            mutation_fields = graph.mutation.len(),
            object_types = graph.objects.len(),
            diagnostics = diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "GraphQL schema synthesized"
        );

        Ok(Synthesized {
            schema,
            graph,
            diagnostics,
        })
    }

    fn is_exposed(&self, op: &OperationDescriptor) -> bool {
        if !op.method.is_exposable() {
            debug!(operation_id = %op.operation_id, method = %op.method, "Skipping non-exposable method");
            return false;
        }
        if op.deprecated && !self.options.include_deprecated {
            debug!(operation_id = %op.operation_id, "Skipping deprecated operation");
            return false;
        }
        true
    }
}

/// Builds the schema served before synthesis completes.
///
/// # Errors
///
/// Returns [`BridgeError::SynthesisFailed`] if the engine rejects it.
pub fn placeholder_schema(limits: &SchemaLimits) -> Result<Schema, BridgeError> {
    let (query, _) = root_object("Query", vec![placeholder_field()]);
    apply_limits(Schema::build("Query", None, None).register(query), limits)
        .finish()
        .map_err(|e| BridgeError::SynthesisFailed(e.to_string()))
}

fn placeholder_graph() -> SchemaGraph {
    SchemaGraph {
        query: vec![placeholder_field().0],
        ..SchemaGraph::default()
    }
}

fn placeholder_field() -> (FieldDef, Field) {
    let ty = GraphType::named(TypeRef::BOOLEAN);
    let field = Field::new(PLACEHOLDER_FIELD, ty.to_type_ref(), |_| {
        FieldFuture::new(async { Ok(None::<Value>) })
    })
    .description("Present while the API exposes no query operations");
    (FieldDef::new(PLACEHOLDER_FIELD, &ty), field)
}

fn root_object(name: &str, fields: Vec<(FieldDef, Field)>) -> (Object, Vec<FieldDef>) {
    let mut object = Object::new(name);
    let mut defs = Vec::with_capacity(fields.len());
    for (def, field) in fields {
        object = object.field(field);
        defs.push(def);
    }
    (object, defs)
}

fn apply_limits(builder: SchemaBuilder, limits: &SchemaLimits) -> SchemaBuilder {
    let builder = builder
        .limit_depth(limits.max_depth)
        .limit_complexity(limits.max_complexity);
    if limits.introspection {
        builder
    } else {
        builder.disable_introspection()
    }
}

fn plan_operation<'a>(
    types: &mut TypeRegistry<'a>,
    op: &'a OperationDescriptor,
    field_name: String,
    links_key: Option<String>,
) -> OperationPlan {
    let type_hint = pascal_case(&field_name);
    let mut argument_names = UniqueNames::default();
    let mut arguments = Vec::with_capacity(op.parameters.len() + 1);

    for param in &op.parameters {
        let graphql_name = argument_names.allocate(&sanitize_identifier(&param.name));
        let hint = format!("{type_hint}{}", pascal_case(&param.name));
        let (ty, shape) = types.input(&param.schema, &hint);
        let ty = if param.required || param.location == ParameterLocation::Path {
            ty.non_null()
        } else {
            ty
        };
        arguments.push(ArgumentBinding {
            graphql_name,
            target: ArgumentTarget::Parameter {
                location: param.location,
                name: param.name.clone(),
            },
            shape,
            ty,
            description: param.description.clone(),
        });
    }

    if let Some(body) = &op.request_body {
        let graphql_name = argument_names.allocate(&format!("{field_name}Input"));
        let (ty, shape) = types.input(&body.schema, &type_hint);
        let ty = if body.required { ty.non_null() } else { ty };
        arguments.push(ArgumentBinding {
            graphql_name,
            target: ArgumentTarget::Body,
            shape,
            ty,
            description: body.description.clone(),
        });
    }

    let (output_type, output) = match op.success_response().and_then(|r| r.schema.as_ref()) {
        Some(schema) => types.output(schema, &type_hint, links_key.as_deref()),
        None => types.json_output(),
    };

    OperationPlan {
        operation_id: op.operation_id.clone(),
        method: op.method,
        path: op.path.clone(),
        field_name,
        description: describe(op),
        arguments,
        output,
        output_type,
        default_body: op.is_mutation() || op.request_body.is_some(),
    }
}

/// Identity of the resolvable links of an operation's success response.
fn links_key(op: &OperationDescriptor, known: &HashMap<&str, usize>) -> Option<String> {
    let response = op.success_response()?;
    let mut parts: Vec<String> = response
        .links
        .iter()
        .filter(|link| known.contains_key(link.target_operation_id.as_str()))
        .map(|link| {
            let params: Vec<String> = link
                .parameters
                .iter()
                .map(|(name, expression)| format!("{name}={expression}"))
                .collect();
            format!(
                "{}->{}({})",
                link.name,
                link.target_operation_id,
                params.join(",")
            )
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.sort();
    Some(parts.join(";"))
}

fn attach_links(
    types: &mut TypeRegistry<'_>,
    op: &OperationDescriptor,
    invoker: &Arc<OperationInvoker>,
    invokers: &[Arc<OperationInvoker>],
    known: &HashMap<&str, usize>,
    diagnostics: &mut Vec<String>,
) {
    let Some(response) = op.success_response() else {
        return;
    };
    for link in &response.links {
        let Some(&target) = known.get(link.target_operation_id.as_str()) else {
            warn!(
                operation_id = %op.operation_id,
                link = %link.name,
                target = %link.target_operation_id,
                "Dropping link to unknown operation"
            );
            diagnostics.push(format!(
                "link '{}' on '{}' targets unknown operation '{}'",
                link.name, op.operation_id, link.target_operation_id
            ));
            continue;
        };

        let Some(type_name) = invoker.plan.output.object_name() else {
            warn!(operation_id = %op.operation_id, link = %link.name, "Dropping link on non-object response");
            diagnostics.push(format!(
                "link '{}' on '{}' ignored: the response is not an object",
                link.name, op.operation_id
            ));
            continue;
        };

        let field_name = sanitize_identifier(&link.name);
        match types.link_slot(type_name, &field_name) {
            LinkSlot::Free => {}
            LinkSlot::Attached => continue,
            LinkSlot::Taken | LinkSlot::Missing => {
                warn!(
                    operation_id = %op.operation_id,
                    link = %link.name,
                    type_name,
                    "Link name collides with an existing field"
                );
                diagnostics.push(format!(
                    "link '{}' on '{}' skipped: {type_name}.{field_name} already exists",
                    link.name, op.operation_id
                ));
                continue;
            }
        }

        let (plan, unknown) = LinkPlan::new(field_name, link, Arc::clone(&invokers[target]));
        for parameter in unknown {
            warn!(
                link = %link.name,
                target = %link.target_operation_id,
                parameter = %parameter,
                "Link parameter does not exist on target operation"
            );
            diagnostics.push(format!(
                "link '{}' on '{}': parameter '{parameter}' is not accepted by '{}'",
                link.name, op.operation_id, link.target_operation_id
            ));
        }
        let (def, field) = Arc::new(plan).field();
        types.attach_link(type_name, def, field);
    }
}

/// First supported security scheme securing `op`.
fn viewer_scheme(document: &OpenApiDocument, op: &OperationDescriptor) -> Option<(String, ViewerScheme)> {
    op.security.iter().find_map(|name| {
        document
            .security_scheme(name)
            .and_then(ViewerScheme::from_scheme)
            .map(|scheme| (name.clone(), scheme))
    })
}
