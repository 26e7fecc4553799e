//! Entity records: field values plus provenance.

use std::hash::{Hash, Hasher};

use arbor_foundation::{ArVec, EntitySource, EntityTypeId, Value};

/// The stored payload of one entity.
///
/// Records are immutable; edits produce a new record that shares unchanged
/// field values with the old one.
///
/// `Eq`/`Hash` include the source. [`EntityData::ignoring_source`] gives the
/// second pair, under which two records that differ only by source compare
/// equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityData {
    ty: EntityTypeId,
    source: EntitySource,
    fields: ArVec<Value>,
}

impl EntityData {
    /// Creates a record.
    #[must_use]
    pub fn new(ty: EntityTypeId, source: EntitySource, fields: impl Into<ArVec<Value>>) -> Self {
        Self {
            ty,
            source,
            fields: fields.into(),
        }
    }

    /// Returns the concrete type.
    #[must_use]
    pub fn entity_type(&self) -> EntityTypeId {
        self.ty
    }

    /// Returns the provenance tag.
    #[must_use]
    pub fn source(&self) -> &EntitySource {
        &self.source
    }

    /// Returns all field values in shape order.
    #[must_use]
    pub fn fields(&self) -> &ArVec<Value> {
        &self.fields
    }

    /// Returns one field value.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Returns a copy with one field replaced.
    #[must_use]
    pub fn with_field(&self, index: usize, value: Value) -> Option<Self> {
        Some(Self {
            ty: self.ty,
            source: self.source.clone(),
            fields: self.fields.update(index, value)?,
        })
    }

    /// Returns a copy with all fields replaced.
    #[must_use]
    pub fn with_fields(&self, fields: impl Into<ArVec<Value>>) -> Self {
        Self {
            ty: self.ty,
            source: self.source.clone(),
            fields: fields.into(),
        }
    }

    /// Returns a copy with a different source.
    #[must_use]
    pub fn with_source(&self, source: EntitySource) -> Self {
        Self {
            ty: self.ty,
            source,
            fields: self.fields.clone(),
        }
    }

    /// Compares type and fields, ignoring the source.
    #[must_use]
    pub fn eq_ignoring_source(&self, other: &Self) -> bool {
        self.ty == other.ty && self.fields == other.fields
    }

    /// Hashes type and fields, ignoring the source.
    pub fn hash_ignoring_source<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.fields.hash(state);
    }

    /// Wraps the record for use as a key under the source-blind pair.
    #[must_use]
    pub fn ignoring_source(&self) -> IgnoringSource<'_> {
        IgnoringSource(self)
    }
}

/// A record viewed through its source-blind equality and hash.
#[derive(Clone, Copy, Debug)]
pub struct IgnoringSource<'a>(pub &'a EntityData);

impl PartialEq for IgnoringSource<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignoring_source(other.0)
    }
}

impl Eq for IgnoringSource<'_> {}

impl Hash for IgnoringSource<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_ignoring_source(state);
    }
}
