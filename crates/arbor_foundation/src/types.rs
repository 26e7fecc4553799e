//! Declared field types used by entity shapes.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::EntityTypeId;

/// Identifier of a tagged-union type declared in a schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantTypeId(pub(crate) u32);

impl VariantTypeId {
    /// Creates a variant type id from its raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this variant type.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Declared type of an entity field.
///
/// Field types drive value validation and the soft-link walk: the walker only
/// descends into positions whose declared type can hold a [`FieldType::Link`].
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String type.
    String,
    /// Soft link to an entity of the given type (or one of its subtypes).
    Link(EntityTypeId),
    /// Ordered list of elements.
    List(Box<FieldType>),
    /// Set of elements.
    Set(Box<FieldType>),
    /// Map with the given key and value types.
    Map(Box<FieldType>, Box<FieldType>),
    /// Optional type (value or nil).
    Option(Box<FieldType>),
    /// Tagged union declared in the schema.
    Variant(VariantTypeId),
    /// Any type (accepts any value).
    Any,
}

impl FieldType {
    /// Creates a list type with the given element type.
    #[must_use]
    pub fn list(element: FieldType) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a set type with the given element type.
    #[must_use]
    pub fn set(element: FieldType) -> Self {
        Self::Set(Box::new(element))
    }

    /// Creates a map type with the given key and value types.
    #[must_use]
    pub fn map(key: FieldType, value: FieldType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Creates an optional type.
    #[must_use]
    pub fn option(inner: FieldType) -> Self {
        Self::Option(Box::new(inner))
    }

    /// Creates a soft-link type.
    #[must_use]
    pub const fn link(target: EntityTypeId) -> Self {
        Self::Link(target)
    }

    /// Returns true if this type can be nil.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        matches!(self, Self::Option(_) | Self::Any)
    }

    /// Returns true if this type is a scalar usable as a symbolic-key part.
    #[must_use]
    pub const fn is_key_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int | Self::Float | Self::String | Self::Link(_)
        )
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Link(ty) => write!(f, "link<{ty}>"),
            Self::List(t) => write!(f, "list<{t:?}>"),
            Self::Set(t) => write!(f, "set<{t:?}>"),
            Self::Map(k, v) => write!(f, "map<{k:?}, {v:?}>"),
            Self::Option(t) => write!(f, "option<{t:?}>"),
            Self::Variant(id) => write!(f, "variant#{}", id.0),
            Self::Any => write!(f, "any"),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
