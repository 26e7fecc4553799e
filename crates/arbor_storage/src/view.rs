//! Read access shared by snapshots and builders.
//!
//! [`StorageView`] is a borrowed, copyable window onto one consistent state.
//! Snapshots hand out views of their frozen state; builders hand out views
//! of their working state, so every query reads the same way on both.

use std::collections::{BTreeMap, HashSet};

use arbor_foundation::{
    EntityId, EntitySource, EntityTypeId, Error, ErrorContext, Result, SymbolicKey, Value,
};

use crate::entity::EntityTable;
use crate::index::{SourceIndex, SymbolicIdIndex};
use crate::record::EntityData;
use crate::registry::DescriptorId;
use crate::relation::RelationIndex;
use crate::schema::{EntityShape, Schema};
use crate::soft_link::{self, SoftLinkIndex};

/// Records plus every index derived from them.
#[derive(Clone, Debug, Default)]
pub(crate) struct Indexes {
    pub entities: EntityTable,
    pub relations: RelationIndex,
    pub soft_links: SoftLinkIndex,
    pub symbolic_ids: SymbolicIdIndex,
    pub sources: SourceIndex,
}

/// Read-only access to one consistent store state.
#[derive(Clone, Copy)]
pub struct StorageView<'a> {
    schema: &'a Schema,
    state: &'a Indexes,
}

impl<'a> StorageView<'a> {
    pub(crate) fn new(schema: &'a Schema, state: &'a Indexes) -> Self {
        Self { schema, state }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(self) -> &'a Schema {
        self.schema
    }

    /// Returns true if `id` refers to a live entity.
    #[must_use]
    pub fn contains(self, id: EntityId) -> bool {
        self.state.entities.exists(id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(self) -> usize {
        self.state.entities.len()
    }

    /// Returns the record of a live entity.
    #[must_use]
    pub fn data(self, id: EntityId) -> Option<&'a EntityData> {
        self.state.entities.get(id)
    }

    /// Returns a typed view of a live entity.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` or `StaleEntity` if `id` is not live.
    pub fn entity(self, id: EntityId) -> Result<EntityView<'a>> {
        let data = self.state.entities.require(id)?;
        Ok(EntityView {
            view: self,
            id,
            data,
        })
    }

    /// Entities of exactly this concrete type, in id order.
    pub fn entities(self, ty: EntityTypeId) -> impl Iterator<Item = EntityView<'a>> {
        self.state
            .entities
            .of_type(ty)
            .map(move |(id, data)| EntityView {
                view: self,
                id,
                data,
            })
    }

    /// Entities of every concrete type that is-a `ty`.
    ///
    /// Grouped by concrete type in declaration order, id order within.
    pub fn entities_of_kind(self, ty: EntityTypeId) -> impl Iterator<Item = EntityView<'a>> {
        self.schema
            .concrete_kinds(ty)
            .iter()
            .flat_map(move |&kind| self.entities(kind))
    }

    /// Parent of `child` under `d`.
    #[must_use]
    pub fn parent(self, d: DescriptorId, child: EntityId) -> Option<EntityId> {
        self.state.relations.parent(d, child)
    }

    /// Ordered children of `parent` under `d`.
    #[must_use]
    pub fn children(self, d: DescriptorId, parent: EntityId) -> Vec<EntityId> {
        self.state.relations.children(d, parent).collect()
    }

    /// The child of a one-to-one `parent` under `d`.
    #[must_use]
    pub fn child(self, d: DescriptorId, parent: EntityId) -> Option<EntityId> {
        self.state.relations.child(d, parent)
    }

    /// Entity holding a symbolic key.
    #[must_use]
    pub fn resolve(self, key: &SymbolicKey) -> Option<EntityId> {
        self.state.symbolic_ids.get(key)
    }

    /// Returns true if some entity holds `key`.
    #[must_use]
    pub fn contains_key(self, key: &SymbolicKey) -> bool {
        self.resolve(key).is_some()
    }

    /// Symbolic key of an entity, if its type has one.
    #[must_use]
    pub fn symbolic_key(self, id: EntityId) -> Option<&'a SymbolicKey> {
        self.state.symbolic_ids.key_of(id)
    }

    /// Entities whose fields link to `key`, in id order.
    #[must_use]
    pub fn referrers(self, key: &SymbolicKey) -> Vec<EntityId> {
        self.state.soft_links.referrers(key).collect()
    }

    /// Every symbolic key an entity's fields link to.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not live.
    pub fn links_of(self, id: EntityId) -> Result<HashSet<SymbolicKey>> {
        let data = self.state.entities.require(id)?;
        let shape = self.schema.shape(data.entity_type())?;
        Ok(soft_link::links_of(self.schema, shape, data))
    }

    /// Entities grouped by source, for sources accepted by `filter`.
    pub fn entities_by_source(
        self,
        mut filter: impl FnMut(&EntitySource) -> bool,
    ) -> BTreeMap<EntitySource, Vec<EntityId>> {
        let sources: &'a SourceIndex = &self.state.sources;
        sources
            .sources()
            .filter(|source| filter(source))
            .map(|source| (source.clone(), sources.get(source).collect()))
            .collect()
    }
}

/// Read access shared by snapshots and builders.
pub trait EntityStorage {
    /// Returns a view of the current state.
    fn view(&self) -> StorageView<'_>;

    /// Returns true if `id` refers to a live entity.
    fn contains(&self, id: EntityId) -> bool {
        self.view().contains(id)
    }

    /// Number of live entities.
    fn entity_count(&self) -> usize {
        self.view().entity_count()
    }

    /// Returns a typed view of a live entity.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` or `StaleEntity` if `id` is not live.
    fn entity(&self, id: EntityId) -> Result<EntityView<'_>> {
        self.view().entity(id)
    }

    /// Parent of `child` under `d`.
    fn parent(&self, d: DescriptorId, child: EntityId) -> Option<EntityId> {
        self.view().parent(d, child)
    }

    /// Ordered children of `parent` under `d`.
    fn children(&self, d: DescriptorId, parent: EntityId) -> Vec<EntityId> {
        self.view().children(d, parent)
    }

    /// The child of a one-to-one `parent` under `d`.
    fn child(&self, d: DescriptorId, parent: EntityId) -> Option<EntityId> {
        self.view().child(d, parent)
    }

    /// Entity holding a symbolic key.
    fn resolve(&self, key: &SymbolicKey) -> Option<EntityId> {
        self.view().resolve(key)
    }

    /// Entities whose fields link to `key`.
    fn referrers(&self, key: &SymbolicKey) -> Vec<EntityId> {
        self.view().referrers(key)
    }
}

/// A typed window onto one live entity.
#[derive(Clone, Copy)]
pub struct EntityView<'a> {
    view: StorageView<'a>,
    id: EntityId,
    data: &'a EntityData,
}

impl<'a> EntityView<'a> {
    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the concrete type.
    #[must_use]
    pub fn entity_type(&self) -> EntityTypeId {
        self.id.entity_type()
    }

    /// Returns the concrete type's name.
    #[must_use]
    pub fn type_name(&self) -> &'a str {
        self.view.schema.type_name(self.id.entity_type())
    }

    /// Returns the provenance tag.
    #[must_use]
    pub fn source(&self) -> &'a EntitySource {
        self.data.source()
    }

    /// Returns the underlying record.
    #[must_use]
    pub fn data(&self) -> &'a EntityData {
        self.data
    }

    fn shape(&self) -> Result<&'a EntityShape> {
        self.view.schema.shape(self.id.entity_type())
    }

    /// Returns a field value by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the type declares no such field.
    pub fn get(&self, field: &str) -> Result<&'a Value> {
        let index = self.shape()?.require_field(field)?;
        self.data
            .field(index)
            .ok_or_else(|| Error::internal(format!("record of {:?} is missing field {field}", self.id)))
    }

    /// Returns a string field, or `None` if unset, unknown or not a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&'a str> {
        self.get(field).ok().and_then(Value::as_str)
    }

    /// Returns an integer field, or `None` if unset, unknown or not an integer.
    #[must_use]
    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).ok().and_then(Value::as_int)
    }

    /// Returns a boolean field, or `None` if unset, unknown or not a boolean.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).ok().and_then(Value::as_bool)
    }

    /// Field names and values in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'a str, Value)> {
        let Ok(shape) = self.shape() else {
            return Vec::new();
        };
        shape
            .fields()
            .iter()
            .zip(self.data.fields().iter())
            .map(|(field, value)| (&*field.name, value.clone()))
            .collect()
    }

    /// Returns the entity's symbolic key, if its type has one.
    #[must_use]
    pub fn symbolic_key(&self) -> Option<&'a SymbolicKey> {
        self.view.symbolic_key(self.id)
    }

    /// Every symbolic key this entity's fields link to.
    #[must_use]
    pub fn links(&self) -> HashSet<SymbolicKey> {
        self.shape()
            .map(|shape| soft_link::links_of(self.view.schema, shape, self.data))
            .unwrap_or_default()
    }

    /// Parent under `d`.
    #[must_use]
    pub fn parent(&self, d: DescriptorId) -> Option<EntityId> {
        self.view.parent(d, self.id)
    }

    /// Parent under a mandatory relation.
    ///
    /// # Errors
    ///
    /// Returns `UninitializedField` naming the relation if the entity has no
    /// parent under `d`. Committed entities always have one; a builder may
    /// hold an entity that is not yet attached.
    pub fn required_parent(&self, d: DescriptorId) -> Result<EntityId> {
        self.parent(d).ok_or_else(|| {
            Error::uninitialized(self.type_name(), self.view.schema.describe(d))
                .with_context(ErrorContext::new().with_entity(self.id))
        })
    }

    /// Ordered children under `d`.
    #[must_use]
    pub fn children(&self, d: DescriptorId) -> Vec<EntityId> {
        self.view.children(d, self.id)
    }

    /// One-to-one child under `d`.
    #[must_use]
    pub fn child(&self, d: DescriptorId) -> Option<EntityId> {
        self.view.child(d, self.id)
    }
}

impl std::fmt::Debug for EntityView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityView")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("data", self.data)
            .finish()
    }
}

impl std::fmt::Debug for StorageView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageView")
            .field("entities", &self.entity_count())
            .finish_non_exhaustive()
    }
}
