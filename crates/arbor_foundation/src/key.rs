//! Symbolic keys: stable, type-qualified names for entities.

use std::fmt;
use std::sync::Arc;

use crate::entity::EntityTypeId;
use crate::value::Value;

/// Stable name of an entity, derived from its own key fields.
///
/// A symbolic key is unique within its entity type. Other entities refer to
/// it through [`Value::Link`] rather than through an [`EntityId`], so the
/// reference survives removal and re-creation of the target.
///
/// [`EntityId`]: crate::EntityId
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SymbolicKey {
    ty: EntityTypeId,
    parts: Arc<[Value]>,
}

impl SymbolicKey {
    /// Creates a key for the given entity type from its key field values.
    #[must_use]
    pub fn new(ty: EntityTypeId, parts: impl Into<Arc<[Value]>>) -> Self {
        Self {
            ty,
            parts: parts.into(),
        }
    }

    /// Creates a key with a single string part, the most common shape.
    #[must_use]
    pub fn named(ty: EntityTypeId, name: &str) -> Self {
        Self::new(ty, vec![Value::from(name)])
    }

    /// Returns the entity type this key names.
    #[must_use]
    pub const fn entity_type(&self) -> EntityTypeId {
        self.ty
    }

    /// Returns the key field values in declaration order.
    #[must_use]
    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// Returns a single key part.
    #[must_use]
    pub fn part(&self, index: usize) -> Option<&Value> {
        self.parts.get(index)
    }
}

impl fmt::Debug for SymbolicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolicKey({}", self.ty)?;
        for part in self.parts.iter() {
            write!(f, " {part:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for SymbolicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.ty)?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, "]")
    }
}
