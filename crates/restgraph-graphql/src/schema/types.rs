//! Mapping of OpenAPI schemas to GraphQL types.
//!
//! The [`TypeRegistry`] turns schema objects into dynamic object, input and
//! enum types while synthesis runs. Structurally identical schemas map to a
//! single type, and every name is allocated from one [`UniqueNames`] pool so
//! that the result only depends on document order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, InputObject, InputValue, Object, Scalar, SchemaBuilder, TypeRef,
};
use indexmap::IndexMap;
use restgraph_openapi::naming::{
    UniqueNames, pascal_case, sanitize_enum_value, sanitize_identifier, sanitize_type_name,
};
use restgraph_openapi::{OpenApiDocument, SchemaObject};
use serde_json::Value as JsonValue;

use super::graph::{EnumDef, FieldDef, GraphType, ObjectDef, SchemaGraph};
use super::values::property_field;

/// Name of the scalar used for free-form values.
pub const JSON_SCALAR: &str = "JSON";

/// Names that are never handed out to generated types.
pub(crate) const RESERVED_TYPE_NAMES: [&str; 9] = [
    "Query",
    "Mutation",
    "Subscription",
    JSON_SCALAR,
    TypeRef::STRING,
    TypeRef::INT,
    TypeRef::FLOAT,
    TypeRef::BOOLEAN,
    TypeRef::ID,
];

const MAX_SCHEMA_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    String,
    Int,
    Float,
    Boolean,
    Json,
}

impl ScalarKind {
    pub(crate) fn type_name(self) -> &'static str {
        match self {
            Self::String => TypeRef::STRING,
            Self::Int => TypeRef::INT,
            Self::Float => TypeRef::FLOAT,
            Self::Boolean => TypeRef::BOOLEAN,
            Self::Json => JSON_SCALAR,
        }
    }
}

/// GraphQL enum values and the raw values they stand for.
#[derive(Debug)]
pub(crate) struct EnumMapping {
    pub(crate) name: String,
    values: Vec<(String, JsonValue)>,
}

impl EnumMapping {
    pub(crate) fn new(name: String, values: Vec<(String, JsonValue)>) -> Self {
        Self { name, values }
    }

    pub(crate) fn graphql_name(&self, raw: &JsonValue) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, value)| value == raw)
            .or_else(|| {
                let text = raw.to_string();
                self.values
                    .iter()
                    .find(|(_, value)| value.as_str() == Some(text.as_str()))
            })
            .map(|(name, _)| name.as_str())
    }

    pub(crate) fn raw_value(&self, name: &str) -> Option<&JsonValue> {
        self.values
            .iter()
            .find(|(graphql, _)| graphql == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }
}

/// How a decoded response value is turned into a field value.
#[derive(Debug, Clone)]
pub(crate) enum OutputShape {
    Scalar(ScalarKind),
    Enum(Arc<EnumMapping>),
    Object(String),
    List(Box<OutputShape>),
}

impl OutputShape {
    /// Name of the object type, looking through lists.
    pub(crate) fn object_name(&self) -> Option<&str> {
        match self {
            Self::Object(name) => Some(name),
            Self::List(inner) => inner.object_name(),
            Self::Scalar(_) | Self::Enum(_) => None,
        }
    }

    /// Whether a non-JSON body can be returned as text.
    pub(crate) fn accepts_text(&self) -> bool {
        matches!(self, Self::Scalar(ScalarKind::String | ScalarKind::Json))
    }
}

/// How an argument value is turned into request JSON.
#[derive(Debug, Clone)]
pub(crate) enum InputShape {
    Scalar(ScalarKind),
    Enum(Arc<EnumMapping>),
    Object(String),
    List(Box<InputShape>),
}

impl InputShape {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.type_name().to_string(),
            Self::Enum(mapping) => format!("enum {}", mapping.name),
            Self::Object(name) => format!("input {name}"),
            Self::List(inner) => format!("[{}]", inner.describe()),
        }
    }
}

/// Maps one input object field back to its property.
#[derive(Debug, Clone)]
pub(crate) struct InputFieldBinding {
    pub(crate) graphql_name: String,
    pub(crate) raw_name: String,
    pub(crate) shape: InputShape,
}

/// Field bindings of every input object, by type name.
pub(crate) type InputCatalog = HashMap<String, Vec<InputFieldBinding>>;

/// Result of trying to add a link field to an object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkSlot {
    Free,
    /// The same link was already attached through a shared type.
    Attached,
    /// A property or a different field already uses the name.
    Taken,
    Missing,
}

pub(crate) struct ObjectSpec {
    name: String,
    description: Option<String>,
    fields: Vec<(FieldDef, Field)>,
    link_fields: HashSet<String>,
}

impl ObjectSpec {
    fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            fields: Vec::new(),
            link_fields: HashSet::new(),
        }
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(def, _)| def.name == name)
    }
}

struct InputSpec {
    name: String,
    description: Option<String>,
    fields: Vec<(FieldDef, InputValue)>,
    bindings: Vec<InputFieldBinding>,
}

struct ObjectSchema<'a> {
    ref_name: Option<&'a str>,
    title: Option<&'a str>,
    description: Option<&'a str>,
    properties: IndexMap<&'a str, &'a SchemaObject>,
    required: HashSet<&'a str>,
}

enum SchemaKind<'a> {
    Scalar(ScalarKind),
    Enum {
        ref_name: Option<&'a str>,
        title: Option<&'a str>,
        values: &'a [JsonValue],
    },
    Array(Option<&'a SchemaObject>),
    Object(ObjectSchema<'a>),
}

/// Registry of generated types for one synthesis run.
pub(crate) struct TypeRegistry<'a> {
    document: &'a OpenApiDocument,
    names: UniqueNames,
    objects: IndexMap<String, ObjectSpec>,
    inputs: IndexMap<String, InputSpec>,
    enums: IndexMap<String, Arc<EnumMapping>>,
    object_keys: HashMap<String, String>,
    input_keys: HashMap<String, String>,
    enum_keys: HashMap<String, Arc<EnumMapping>>,
    uses_json: bool,
}

impl<'a> TypeRegistry<'a> {
    pub(crate) fn new(document: &'a OpenApiDocument) -> Self {
        Self {
            document,
            names: UniqueNames::with_reserved(RESERVED_TYPE_NAMES),
            objects: IndexMap::new(),
            inputs: IndexMap::new(),
            enums: IndexMap::new(),
            object_keys: HashMap::new(),
            input_keys: HashMap::new(),
            enum_keys: HashMap::new(),
            uses_json: false,
        }
    }

    /// Allocates a type name that no other generated type uses.
    pub(crate) fn allocate_name(&mut self, base: &str) -> String {
        self.names.allocate(&sanitize_type_name(base))
    }

    /// Maps a response schema to a nullable output type.
    ///
    /// `links_key` identifies the links that will be attached to the
    /// resulting object type; schemas carrying different links never share
    /// a type.
    pub(crate) fn output(
        &mut self,
        schema: &'a SchemaObject,
        hint: &str,
        links_key: Option<&str>,
    ) -> (GraphType, OutputShape) {
        self.output_at(schema, hint, links_key, 0)
    }

    /// Maps a parameter or body schema to a nullable input type.
    pub(crate) fn input(&mut self, schema: &'a SchemaObject, hint: &str) -> (GraphType, InputShape) {
        self.input_at(schema, hint, 0)
    }

    /// Returns the JSON scalar output, marking the scalar as used.
    pub(crate) fn json_output(&mut self) -> (GraphType, OutputShape) {
        self.uses_json = true;
        (
            GraphType::named(JSON_SCALAR),
            OutputShape::Scalar(ScalarKind::Json),
        )
    }

    /// Checks whether a link field named `field_name` can go on `type_name`.
    pub(crate) fn link_slot(&self, type_name: &str, field_name: &str) -> LinkSlot {
        match self.objects.get(type_name) {
            None => LinkSlot::Missing,
            Some(spec) if spec.link_fields.contains(field_name) => LinkSlot::Attached,
            Some(spec) if spec.has_field(field_name) => LinkSlot::Taken,
            Some(_) => LinkSlot::Free,
        }
    }

    pub(crate) fn attach_link(&mut self, type_name: &str, def: FieldDef, field: Field) {
        if let Some(spec) = self.objects.get_mut(type_name) {
            spec.link_fields.insert(def.name.clone());
            spec.fields.push((def, field));
        }
    }

    /// Adds a hand-built object type such as a viewer.
    pub(crate) fn add_object(
        &mut self,
        name: &str,
        description: Option<&str>,
        fields: Vec<(FieldDef, Field)>,
    ) {
        let mut spec = ObjectSpec::new(name, description);
        spec.fields = fields;
        self.objects.insert(name.to_string(), spec);
    }

    pub(crate) fn input_catalog(&self) -> InputCatalog {
        self.inputs
            .iter()
            .map(|(name, spec)| (name.clone(), spec.bindings.clone()))
            .collect()
    }

    /// Registers every generated type and records it in `graph`.
    pub(crate) fn register(self, mut builder: SchemaBuilder, graph: &mut SchemaGraph) -> SchemaBuilder {
        if self.uses_json {
            builder = builder.register(
                Scalar::new(JSON_SCALAR).description("Arbitrary JSON value"),
            );
        }

        for mapping in self.enums.values() {
            let mut enum_type = Enum::new(mapping.name.as_str());
            for name in mapping.names() {
                enum_type = enum_type.item(EnumItem::new(name));
            }
            builder = builder.register(enum_type);
            graph.enums.push(EnumDef {
                name: mapping.name.clone(),
                values: mapping.names().map(str::to_string).collect(),
            });
        }

        for spec in self.inputs.into_values() {
            let mut input = InputObject::new(spec.name.as_str());
            if let Some(description) = &spec.description {
                input = input.description(description);
            }
            let mut defs = Vec::with_capacity(spec.fields.len());
            for (def, value) in spec.fields {
                input = input.field(value);
                defs.push(def);
            }
            builder = builder.register(input);
            graph.inputs.push(ObjectDef {
                name: spec.name,
                fields: defs,
            });
        }

        for spec in self.objects.into_values() {
            let mut object = Object::new(spec.name.as_str());
            if let Some(description) = &spec.description {
                object = object.description(description);
            }
            let mut defs = Vec::with_capacity(spec.fields.len());
            for (def, field) in spec.fields {
                object = object.field(field);
                defs.push(def);
            }
            builder = builder.register(object);
            graph.objects.push(ObjectDef {
                name: spec.name,
                fields: defs,
            });
        }

        builder
    }

    fn scalar_output(&mut self, kind: ScalarKind) -> (GraphType, OutputShape) {
        if kind == ScalarKind::Json {
            self.uses_json = true;
        }
        (GraphType::named(kind.type_name()), OutputShape::Scalar(kind))
    }

    fn output_at(
        &mut self,
        schema: &'a SchemaObject,
        hint: &str,
        links_key: Option<&str>,
        depth: usize,
    ) -> (GraphType, OutputShape) {
        if depth > MAX_SCHEMA_DEPTH {
            return self.json_output();
        }
        match self.classify(schema) {
            SchemaKind::Scalar(kind) => self.scalar_output(kind),
            SchemaKind::Enum {
                ref_name,
                title,
                values,
            } => {
                let mapping = self.enum_type(ref_name, title, values, hint);
                (
                    GraphType::named(mapping.name.as_str()),
                    OutputShape::Enum(mapping),
                )
            }
            SchemaKind::Array(items) => {
                let (ty, shape) = match items {
                    Some(items) => self.output_at(items, hint, links_key, depth + 1),
                    None => self.json_output(),
                };
                (ty.list(), OutputShape::List(Box::new(shape)))
            }
            SchemaKind::Object(object) => {
                let name = self.object_type(object, hint, links_key, depth);
                (GraphType::named(name.as_str()), OutputShape::Object(name))
            }
        }
    }

    fn object_type(
        &mut self,
        object: ObjectSchema<'a>,
        hint: &str,
        links_key: Option<&str>,
        depth: usize,
    ) -> String {
        let mut key = match object.ref_name {
            Some(name) => format!("ref:{name}"),
            None => self.object_key(&object, false, depth),
        };
        if let Some(links) = links_key {
            key.push_str("|links:");
            key.push_str(links);
        }
        if let Some(name) = self.object_keys.get(&key) {
            return name.clone();
        }

        let base = object
            .title
            .or(object.ref_name)
            .map_or_else(|| sanitize_type_name(hint), sanitize_type_name);
        let name = self.names.allocate(&base);
        self.object_keys.insert(key, name.clone());
        self.objects
            .insert(name.clone(), ObjectSpec::new(&name, object.description));

        let mut field_names = UniqueNames::default();
        let mut fields = Vec::with_capacity(object.properties.len());
        for (raw, property) in &object.properties {
            let graphql_name = field_names.allocate(&sanitize_identifier(raw));
            let child_hint = format!("{name}{}", pascal_case(raw));
            let (ty, shape) = self.output_at(*property, &child_hint, None, depth + 1);
            let mut field = property_field(&graphql_name, raw, &ty, shape);
            if let Some(description) = property.description.as_deref() {
                field = field.description(description);
            }
            fields.push((FieldDef::new(&graphql_name, &ty), field));
        }

        if let Some(spec) = self.objects.get_mut(&name) {
            spec.fields = fields;
        }
        name
    }

    fn input_at(
        &mut self,
        schema: &'a SchemaObject,
        hint: &str,
        depth: usize,
    ) -> (GraphType, InputShape) {
        if depth > MAX_SCHEMA_DEPTH {
            self.uses_json = true;
            return (
                GraphType::named(JSON_SCALAR),
                InputShape::Scalar(ScalarKind::Json),
            );
        }
        match self.classify(schema) {
            SchemaKind::Scalar(kind) => {
                if kind == ScalarKind::Json {
                    self.uses_json = true;
                }
                (GraphType::named(kind.type_name()), InputShape::Scalar(kind))
            }
            SchemaKind::Enum {
                ref_name,
                title,
                values,
            } => {
                let mapping = self.enum_type(ref_name, title, values, hint);
                (
                    GraphType::named(mapping.name.as_str()),
                    InputShape::Enum(mapping),
                )
            }
            SchemaKind::Array(items) => {
                let (ty, shape) = match items {
                    Some(items) => self.input_at(items, hint, depth + 1),
                    None => {
                        self.uses_json = true;
                        (
                            GraphType::named(JSON_SCALAR),
                            InputShape::Scalar(ScalarKind::Json),
                        )
                    }
                };
                (ty.list(), InputShape::List(Box::new(shape)))
            }
            SchemaKind::Object(object) => {
                let name = self.input_type(object, hint, depth);
                (GraphType::named(name.as_str()), InputShape::Object(name))
            }
        }
    }

    fn input_type(&mut self, object: ObjectSchema<'a>, hint: &str, depth: usize) -> String {
        let key = match object.ref_name {
            Some(name) => format!("ref:{name}"),
            None => self.object_key(&object, true, depth),
        };
        if let Some(name) = self.input_keys.get(&key) {
            return name.clone();
        }

        let base = sanitize_type_name(object.title.or(object.ref_name).unwrap_or(hint));
        let name = self.names.allocate(&format!("{base}Input"));
        self.input_keys.insert(key, name.clone());
        self.inputs.insert(
            name.clone(),
            InputSpec {
                name: name.clone(),
                description: object.description.map(str::to_string),
                fields: Vec::new(),
                bindings: Vec::new(),
            },
        );

        let mut field_names = UniqueNames::default();
        let mut fields = Vec::with_capacity(object.properties.len());
        let mut bindings = Vec::with_capacity(object.properties.len());
        for (raw, property) in &object.properties {
            let graphql_name = field_names.allocate(&sanitize_identifier(raw));
            let child_hint = format!("{base}{}", pascal_case(raw));
            let (mut ty, shape) = self.input_at(*property, &child_hint, depth + 1);
            if object.required.contains(raw) {
                ty = ty.non_null();
            }
            let mut value = InputValue::new(graphql_name.as_str(), ty.to_type_ref());
            if let Some(description) = property.description.as_deref() {
                value = value.description(description);
            }
            fields.push((FieldDef::new(&graphql_name, &ty), value));
            bindings.push(InputFieldBinding {
                graphql_name,
                raw_name: (*raw).to_string(),
                shape,
            });
        }

        if let Some(spec) = self.inputs.get_mut(&name) {
            spec.fields = fields;
            spec.bindings = bindings;
        }
        name
    }

    fn enum_type(
        &mut self,
        ref_name: Option<&str>,
        title: Option<&str>,
        values: &'a [JsonValue],
        hint: &str,
    ) -> Arc<EnumMapping> {
        let raw: Vec<&JsonValue> = values.iter().filter(|v| !v.is_null()).collect();
        let key = raw
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if let Some(mapping) = self.enum_keys.get(&key) {
            return Arc::clone(mapping);
        }

        let base = title
            .or(ref_name)
            .map_or_else(|| sanitize_type_name(hint), sanitize_type_name);
        let name = self.names.allocate(&base);
        let mut value_names = UniqueNames::default();
        let values = raw
            .into_iter()
            .map(|value| {
                let text = value
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_string);
                (value_names.allocate(&sanitize_enum_value(&text)), value.clone())
            })
            .collect();

        let mapping = Arc::new(EnumMapping::new(name.clone(), values));
        self.enum_keys.insert(key, Arc::clone(&mapping));
        self.enums.insert(name, Arc::clone(&mapping));
        mapping
    }

    fn classify(&self, schema: &'a SchemaObject) -> SchemaKind<'a> {
        let document = self.document;
        let Some((resolved, ref_name)) = document.resolve_schema(schema) else {
            return SchemaKind::Scalar(ScalarKind::Json);
        };

        if !resolved.one_of.is_empty() || !resolved.any_of.is_empty() {
            return SchemaKind::Scalar(ScalarKind::Json);
        }

        let string_enum = resolved.enum_values.iter().any(JsonValue::is_string)
            && resolved
                .enum_values
                .iter()
                .all(|v| v.is_string() || v.is_null());
        if string_enum {
            return SchemaKind::Enum {
                ref_name,
                title: resolved.title.as_deref(),
                values: &resolved.enum_values,
            };
        }

        if !resolved.all_of.is_empty() || resolved.is_object() {
            let mut object = ObjectSchema {
                ref_name,
                title: resolved.title.as_deref(),
                description: resolved.description.as_deref(),
                properties: IndexMap::new(),
                required: HashSet::new(),
            };
            self.merge_into(resolved, &mut object, 0);
            if object.properties.is_empty() {
                return SchemaKind::Scalar(ScalarKind::Json);
            }
            return SchemaKind::Object(object);
        }

        match resolved.type_name() {
            Some("string") => SchemaKind::Scalar(ScalarKind::String),
            Some("integer") => SchemaKind::Scalar(ScalarKind::Int),
            Some("number") => SchemaKind::Scalar(ScalarKind::Float),
            Some("boolean") => SchemaKind::Scalar(ScalarKind::Boolean),
            Some("array") => SchemaKind::Array(resolved.items.as_deref()),
            None if resolved.items.is_some() => SchemaKind::Array(resolved.items.as_deref()),
            _ => SchemaKind::Scalar(ScalarKind::Json),
        }
    }

    /// Collects properties from `schema` and its `allOf` parts.
    fn merge_into(&self, schema: &'a SchemaObject, object: &mut ObjectSchema<'a>, depth: usize) {
        if depth > MAX_SCHEMA_DEPTH {
            return;
        }
        let document = self.document;
        let Some((resolved, _)) = document.resolve_schema(schema) else {
            return;
        };
        for part in &resolved.all_of {
            self.merge_into(part, object, depth + 1);
        }
        for (name, property) in &resolved.properties {
            object.properties.insert(name.as_str(), property);
        }
        object
            .required
            .extend(resolved.required.iter().map(String::as_str));
        if object.description.is_none() {
            object.description = resolved.description.as_deref();
        }
    }

    /// Order-insensitive structural identity of a schema.
    fn shape_key(&self, schema: &'a SchemaObject, input: bool, depth: usize) -> String {
        if depth > MAX_SCHEMA_DEPTH {
            return JSON_SCALAR.to_string();
        }
        match self.classify(schema) {
            SchemaKind::Scalar(kind) => kind.type_name().to_string(),
            SchemaKind::Enum { values, .. } => format!(
                "enum({})",
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            SchemaKind::Array(items) => format!(
                "[{}]",
                items.map_or_else(
                    || JSON_SCALAR.to_string(),
                    |items| self.shape_key(items, input, depth + 1)
                )
            ),
            SchemaKind::Object(object) => match object.ref_name {
                Some(name) => format!("ref:{name}"),
                None => self.object_key(&object, input, depth),
            },
        }
    }

    fn object_key(&self, object: &ObjectSchema<'a>, input: bool, depth: usize) -> String {
        let mut parts: Vec<String> = object
            .properties
            .iter()
            .map(|(name, property)| {
                let marker = if input && object.required.contains(name) {
                    "!"
                } else {
                    ""
                };
                format!(
                    "{name}{marker}:{}",
                    self.shape_key(*property, input, depth + 1)
                )
            })
            .collect();
        parts.sort();
        format!("{{{}}}", parts.join(","))
    }
}
