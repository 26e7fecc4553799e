//! Entity identifiers with type tags and generational indices.

use std::fmt;
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of an entity type.
///
/// Type ids are allocated by the schema registry in declaration order and are
/// stable for the lifetime of that schema.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityTypeId(pub(crate) u32);

impl EntityTypeId {
    /// Creates a type id from its raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this type.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityTypeId({})", self.0)
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Entity identifier: type tag, sequence number, and generation.
///
/// The generation counter increments when a sequence number is reused after
/// removal, so a stale identifier never aliases a newer entity.
///
/// Ordering is by type first, which keeps all entities of one type contiguous
/// in ordered maps.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId {
    /// Concrete type of the entity.
    pub ty: EntityTypeId,
    /// Sequence number within the type.
    pub index: u32,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl EntityId {
    /// Creates a new entity id.
    #[must_use]
    pub const fn new(ty: EntityTypeId, index: u32, generation: u32) -> Self {
        Self {
            ty,
            index,
            generation,
        }
    }

    /// Returns the concrete type of this entity.
    #[must_use]
    pub const fn entity_type(self) -> EntityTypeId {
        self.ty
    }

    /// Returns the inclusive range covering every id of the given type.
    #[must_use]
    pub const fn type_range(ty: EntityTypeId) -> RangeInclusive<EntityId> {
        EntityId::new(ty, 0, 0)..=EntityId::new(ty, u32::MAX, u32::MAX)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}:{}v{})", self.ty, self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}:{})", self.ty, self.index)
    }
}
