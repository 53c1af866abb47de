//! Structural description of a synthesized schema.
//!
//! [`SchemaGraph`] mirrors every type, field and argument registered with the
//! dynamic schema, in registration order. Two synthesis runs over the same
//! document produce equal graphs.

use std::fmt;

use async_graphql::dynamic::TypeRef;
use serde::Serialize;

/// A GraphQL type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum GraphType {
    Named(String),
    NonNull(Box<GraphType>),
    List(Box<GraphType>),
}

impl GraphType {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn non_null(self) -> Self {
        match self {
            Self::NonNull(_) => self,
            other => Self::NonNull(Box::new(other)),
        }
    }

    #[must_use]
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// Converts to the dynamic schema type reference.
    #[must_use]
    pub fn to_type_ref(&self) -> TypeRef {
        match self {
            Self::Named(name) => TypeRef::named(name.clone()),
            Self::NonNull(inner) => TypeRef::NonNull(Box::new(inner.to_type_ref())),
            Self::List(inner) => TypeRef::List(Box::new(inner.to_type_ref())),
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// An argument or input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDef {
    pub name: String,
    pub type_ref: String,
}

impl ArgumentDef {
    pub(crate) fn new(name: &str, ty: &GraphType) -> Self {
        Self {
            name: name.to_string(),
            type_ref: ty.to_string(),
        }
    }
}

/// An output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub type_ref: String,
    pub arguments: Vec<ArgumentDef>,
}

impl FieldDef {
    pub(crate) fn new(name: &str, ty: &GraphType) -> Self {
        Self {
            name: name.to_string(),
            type_ref: ty.to_string(),
            arguments: Vec::new(),
        }
    }

    pub(crate) fn with_arguments(mut self, arguments: Vec<ArgumentDef>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// An object or input object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// The synthesized type graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaGraph {
    pub query: Vec<FieldDef>,
    pub mutation: Vec<FieldDef>,
    pub objects: Vec<ObjectDef>,
    pub inputs: Vec<ObjectDef>,
    pub enums: Vec<EnumDef>,
}

impl SchemaGraph {
    /// Finds an object type by name.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Finds a root field on Query or Mutation.
    #[must_use]
    pub fn root_field(&self, name: &str) -> Option<&FieldDef> {
        self.query
            .iter()
            .chain(&self.mutation)
            .find(|f| f.name == name)
    }

    /// Total number of root fields.
    #[must_use]
    pub fn root_field_count(&self) -> usize {
        self.query.len() + self.mutation.len()
    }
}
