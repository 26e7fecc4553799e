//! Entity type registry and relation descriptor interning.
//!
//! Types are allocated in declaration order; a type may only name
//! supertypes that were declared before it, so the is-a closure can be
//! computed once at declaration time.

// Table sizes are bounded by u32 ids
#![allow(clippy::cast_possible_truncation)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arbor_foundation::{EntityTypeId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interned identifier of a relation descriptor.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub(crate) u32);

impl DescriptorId {
    /// Returns the raw index of this descriptor.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescriptorId({})", self.0)
    }
}

/// Multiplicity of a parent/child relation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelationKind {
    /// A parent has at most one child; a child has at most one parent.
    OneToOne,
    /// A parent has an ordered list of children; a child has one parent.
    OneToMany,
    /// Like [`RelationKind::OneToOne`], with supertypes on either side.
    AbstractOneToOne,
    /// Like [`RelationKind::OneToMany`], with supertypes on either side.
    AbstractOneToMany,
}

impl RelationKind {
    /// Returns true if the declared endpoint types may be supertypes.
    #[must_use]
    pub const fn is_abstract(self) -> bool {
        matches!(self, Self::AbstractOneToOne | Self::AbstractOneToMany)
    }

    /// Returns true if a parent may hold several children.
    #[must_use]
    pub const fn is_one_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::AbstractOneToMany)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::AbstractOneToOne => "abstract-one-to-one",
            Self::AbstractOneToMany => "abstract-one-to-many",
        }
    }
}

/// A typed parent/child relation.
///
/// Descriptors are compared structurally: two descriptors with the same
/// endpoints, kind and optionality are the same relation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationDescriptor {
    /// Declared parent type.
    pub parent: EntityTypeId,
    /// Declared child type.
    pub child: EntityTypeId,
    /// Multiplicity.
    pub kind: RelationKind,
    /// If true, a child may exist without a parent in this relation.
    pub optional: bool,
}

impl RelationDescriptor {
    /// Creates a mandatory descriptor.
    #[must_use]
    pub const fn new(parent: EntityTypeId, child: EntityTypeId, kind: RelationKind) -> Self {
        Self {
            parent,
            child,
            kind,
            optional: false,
        }
    }

    /// Creates a mandatory one-to-one descriptor.
    #[must_use]
    pub const fn one_to_one(parent: EntityTypeId, child: EntityTypeId) -> Self {
        Self::new(parent, child, RelationKind::OneToOne)
    }

    /// Creates a mandatory one-to-many descriptor.
    #[must_use]
    pub const fn one_to_many(parent: EntityTypeId, child: EntityTypeId) -> Self {
        Self::new(parent, child, RelationKind::OneToMany)
    }

    /// Creates a mandatory abstract one-to-one descriptor.
    #[must_use]
    pub const fn abstract_one_to_one(parent: EntityTypeId, child: EntityTypeId) -> Self {
        Self::new(parent, child, RelationKind::AbstractOneToOne)
    }

    /// Creates a mandatory abstract one-to-many descriptor.
    #[must_use]
    pub const fn abstract_one_to_many(parent: EntityTypeId, child: EntityTypeId) -> Self {
        Self::new(parent, child, RelationKind::AbstractOneToMany)
    }

    /// Marks the child side optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Returns true if every child must have a parent before commit.
    #[must_use]
    pub const fn is_mandatory(&self) -> bool {
        !self.optional
    }

    /// Returns a short label for the multiplicity.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        self.kind.label()
    }
}

#[derive(Debug, Clone)]
struct TypeInfo {
    name: Arc<str>,
    is_abstract: bool,
    /// Every type this one is-a, including itself.
    ancestors: HashSet<EntityTypeId>,
}

/// Registry of entity types with their supertype closure.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_name: HashMap<Arc<str>, EntityTypeId>,
}

impl TypeRegistry {
    /// Declares a new type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a supertype is unknown.
    pub fn declare(
        &mut self,
        name: &str,
        supertypes: &[EntityTypeId],
        is_abstract: bool,
    ) -> Result<EntityTypeId> {
        if self.by_name.contains_key(name) {
            return Err(Error::schema_conflict(format!(
                "entity type declared twice: {name}"
            )));
        }
        let id = EntityTypeId::new(u32::try_from(self.types.len()).map_err(|_| {
            Error::schema_conflict("too many entity types".to_string())
        })?);

        let mut ancestors = HashSet::from([id]);
        for &sup in supertypes {
            let info = self.info(sup).ok_or_else(|| {
                Error::unknown_type(format!("supertype {sup} of {name}"))
            })?;
            ancestors.extend(info.ancestors.iter().copied());
        }

        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(Arc::clone(&name), id);
        self.types.push(TypeInfo {
            name,
            is_abstract,
            ancestors,
        });
        Ok(id)
    }

    fn info(&self, ty: EntityTypeId) -> Option<&TypeInfo> {
        self.types.get(ty.index() as usize)
    }

    pub fn lookup(&self, name: &str) -> Option<EntityTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, ty: EntityTypeId) -> Option<&str> {
        self.info(ty).map(|info| &*info.name)
    }

    pub fn contains(&self, ty: EntityTypeId) -> bool {
        self.info(ty).is_some()
    }

    pub fn is_abstract(&self, ty: EntityTypeId) -> bool {
        self.info(ty).is_some_and(|info| info.is_abstract)
    }

    /// Returns true if `ty` is `ancestor` or one of its subtypes.
    pub fn is_a(&self, ty: EntityTypeId, ancestor: EntityTypeId) -> bool {
        self.info(ty)
            .is_some_and(|info| info.ancestors.contains(&ancestor))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityTypeId> + '_ {
        (0..self.types.len()).map(|i| EntityTypeId::new(i as u32))
    }
}

/// Append-only interning table for relation descriptors.
#[derive(Debug, Clone, Default)]
pub(crate) struct DescriptorTable {
    descriptors: Vec<RelationDescriptor>,
    ids: HashMap<RelationDescriptor, DescriptorId>,
}

impl DescriptorTable {
    /// Interns a descriptor, returning the existing id for equal components.
    pub fn intern(&mut self, descriptor: RelationDescriptor) -> DescriptorId {
        if let Some(&id) = self.ids.get(&descriptor) {
            return id;
        }
        let id = DescriptorId(self.descriptors.len() as u32);
        self.descriptors.push(descriptor);
        self.ids.insert(descriptor, id);
        id
    }

    pub fn get(&self, id: DescriptorId) -> Option<&RelationDescriptor> {
        self.descriptors.get(id.0 as usize)
    }

    pub fn id_of(&self, descriptor: &RelationDescriptor) -> Option<DescriptorId> {
        self.ids.get(descriptor).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DescriptorId, &RelationDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (DescriptorId(i as u32), d))
    }
}
