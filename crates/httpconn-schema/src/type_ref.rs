use serde::{Deserialize, Serialize};

/// An algebraic reference to a declared type: a name, wrapped in any
/// combination of array/nullable, or a boolean predicate expression over
/// another named type (used for filter-shaped arguments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    Named(String),
    Array(Box<TypeRef>),
    Nullable(Box<TypeRef>),
    Predicate(String),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn array(inner: TypeRef) -> Self {
        TypeRef::Array(Box::new(inner))
    }

    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }

    /// Strip one layer of `Nullable`, if present.
    pub fn underlying(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner,
            other => other,
        }
    }

    /// The bottom-most named type, skipping `Array`/`Nullable` wrappers.
    /// Returns `None` for `Predicate`, which names a boolean expression
    /// type rather than a scalar/object.
    pub fn root_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name.as_str()),
            TypeRef::Array(inner) | TypeRef::Nullable(inner) => inner.root_name(),
            TypeRef::Predicate(_) => None,
        }
    }
}
