//! Builders: mutable sessions over a base snapshot.
//!
//! A builder clones its base state (O(1) thanks to persistent structures),
//! applies edits with copy-on-write, tracks a merged change log, and folds
//! everything into a new snapshot on commit. Every public mutator is
//! strongly error-safe: a failed call leaves the builder exactly as it was.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arbor_foundation::{
    EntityId, EntitySource, EntityTypeId, Error, ErrorContext, FieldType, Result, SymbolicKey,
    Value,
};

use crate::changes::{ChangeEntry, ChangeLog, EntityChange};
use crate::config::{OnKeyConflict, StoreConfig};
use crate::consistency;
use crate::handle::EntityHandle;
use crate::record::EntityData;
use crate::registry::{DescriptorId, RelationDescriptor};
use crate::relation::EdgeDelta;
use crate::schema::{EntityShape, Schema};
use crate::snapshot::Snapshot;
use crate::soft_link;
use crate::view::{EntityStorage, Indexes, StorageView};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identity of one builder, shared with the handles it binds.
#[derive(Debug)]
pub(crate) struct Session {
    id: u64,
    committed: AtomicBool,
}

impl Session {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            committed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    fn mark_committed(&self) {
        self.committed.store(true, Ordering::Release);
    }
}

/// Something that names an entity inside a builder.
///
/// Implemented by [`EntityId`] and by handles attached to the builder.
pub trait EntityRef {
    /// Resolves to an id in `builder`.
    ///
    /// # Errors
    ///
    /// Returns `ModificationNotAllowed` if the reference does not belong to
    /// this builder.
    fn entity_id(&self, builder: &Builder) -> Result<EntityId>;
}

impl EntityRef for EntityId {
    fn entity_id(&self, _builder: &Builder) -> Result<EntityId> {
        Ok(*self)
    }
}

impl EntityRef for EntityHandle {
    fn entity_id(&self, builder: &Builder) -> Result<EntityId> {
        self.bound_id(builder.session())
    }
}

impl<T: EntityRef + ?Sized> EntityRef for &T {
    fn entity_id(&self, builder: &Builder) -> Result<EntityId> {
        (**self).entity_id(builder)
    }
}

/// Field editor passed to [`Builder::modify`].
pub struct Modifier<'a> {
    schema: &'a Schema,
    shape: &'a EntityShape,
    id: EntityId,
    fields: Vec<Value>,
    source: EntitySource,
}

impl Modifier<'_> {
    /// Returns the entity being edited.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the current (possibly already edited) value of a field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the type declares no such field.
    pub fn get(&self, field: &str) -> Result<&Value> {
        let index = self.shape.require_field(field)?;
        self.fields
            .get(index)
            .ok_or_else(|| Error::internal(format!("field {field} out of range")))
    }

    /// Sets a field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` or `TypeMismatch`.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.shape.require_field(field)?;
        let value = value.into();
        self.schema.check_field(self.shape, index, &value)?;
        self.fields[index] = value;
        Ok(())
    }

    /// Replaces the provenance tag.
    pub fn set_source(&mut self, source: impl Into<EntitySource>) {
        self.source = source.into();
    }
}

/// A mutable session over a base [`Snapshot`].
///
/// Builders are single-owner. Reads see the builder's own edits.
pub struct Builder {
    base: Snapshot,
    state: Indexes,
    changes: ChangeLog,
    dirty: im::OrdSet<EntityId>,
    session: Arc<Session>,
    modification_count: u64,
}

impl Builder {
    pub(crate) fn new(base: Snapshot) -> Self {
        Self {
            state: base.state().clone(),
            base,
            changes: ChangeLog::new(),
            dirty: im::OrdSet::new(),
            session: Session::new(),
            modification_count: 0,
        }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        self.base.schema()
    }

    /// Returns the configuration inherited from the base snapshot.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        self.base.config()
    }

    /// Returns the snapshot this builder started from.
    #[must_use]
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns true once [`Builder::commit`] has succeeded.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.session.is_committed()
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        if self.session.is_committed() {
            return Err(Error::modification_not_allowed(
                "builder",
                "the builder has already been committed",
            ));
        }
        Ok(())
    }

    /// Runs `op`, restoring the builder if it fails.
    pub(crate) fn transact<T>(
        &mut self,
        operation: &str,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.check_open()?;
        let state = self.state.clone();
        let changes = self.changes.clone();
        let dirty = self.dirty.clone();
        let count = self.modification_count;
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = state;
                self.changes = changes;
                self.dirty = dirty;
                self.modification_count = count;
                Err(err.in_operation(operation))
            }
        }
    }

    fn resolve_ref(&self, target: &impl EntityRef) -> Result<EntityId> {
        target.entity_id(self)
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    /// Adds an entity with the given field values.
    ///
    /// Fields not named start at their schema default. Required fields may
    /// be filled in later; they are checked at commit.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField`, `TypeMismatch`, or `DuplicateSymbolicKey`
    /// under [`OnKeyConflict::Error`]. Abstract types cannot be added.
    pub fn add(
        &mut self,
        ty: EntityTypeId,
        source: impl Into<EntitySource>,
        fields: &[(&str, Value)],
    ) -> Result<EntityId> {
        let source = source.into();
        let schema = Arc::clone(self.schema());
        let shape = schema.shape(ty)?;
        let mut values = shape.initial_fields();
        for (name, value) in fields {
            let index = shape.require_field(name)?;
            schema.check_field(shape, index, value)?;
            values[index] = value.clone();
        }
        let data = EntityData::new(ty, source, values);
        self.transact("add", |b| b.insert_record(data))
    }

    /// Attaches a detached handle (and every detached entity wired to it).
    ///
    /// # Errors
    ///
    /// See [`EntityHandle::attach_to`].
    pub fn attach(&mut self, handle: &EntityHandle) -> Result<EntityId> {
        handle.attach_to(self)
    }

    /// Sets one field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField`, `TypeMismatch`, `DuplicateSymbolicKey`, or
    /// `ModificationNotAllowed`.
    pub fn set_field(
        &mut self,
        target: impl EntityRef,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        self.modify(target, |m| m.set(field, value))
    }

    /// Applies several field edits as one atomic change.
    ///
    /// The symbolic key is recomputed afterwards; when it changes, key
    /// uniqueness is enforced and (if enabled) referrers are rewritten.
    ///
    /// # Errors
    ///
    /// Returns whatever `edit` returns, or the errors of
    /// [`Builder::set_field`]. On error nothing is applied.
    pub fn modify<F>(&mut self, target: impl EntityRef, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Modifier<'_>) -> Result<()>,
    {
        let id = self.resolve_ref(&target)?;
        let schema = Arc::clone(self.schema());
        self.transact("modify", |b| {
            let data = b.state.entities.require(id)?.clone();
            let shape = schema.shape(id.entity_type())?;
            let mut modifier = Modifier {
                schema: &schema,
                shape,
                id,
                fields: data.fields().iter().cloned().collect(),
                source: data.source().clone(),
            };
            edit(&mut modifier)?;
            let updated = EntityData::new(id.entity_type(), modifier.source, modifier.fields);
            b.replace_record(id, updated)
        })
    }

    /// Replaces an entity's provenance tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not live in this builder.
    pub fn change_source(
        &mut self,
        target: impl EntityRef,
        source: impl Into<EntitySource>,
    ) -> Result<()> {
        let id = self.resolve_ref(&target)?;
        let source = source.into();
        self.transact("change_source", |b| {
            let data = b.state.entities.require(id)?;
            let updated = data.with_source(source);
            b.replace_record(id, updated)
        })
    }

    /// Removes an entity and, when cascading is enabled, every entity below
    /// it in any relation.
    ///
    /// Returns the removed ids, the target first.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not live in this builder.
    pub fn remove(&mut self, target: impl EntityRef) -> Result<Vec<EntityId>> {
        let id = self.resolve_ref(&target)?;
        self.transact("remove", |b| b.remove_cascade(id))
    }

    /// Rewrites every soft link to `old` into a link to `new`.
    ///
    /// Returns true if any entity changed.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the keys belong to different types.
    pub fn rename(&mut self, old: &SymbolicKey, new: &SymbolicKey) -> Result<bool> {
        if old.entity_type() != new.entity_type() {
            let schema = self.schema();
            return Err(Error::type_mismatch(
                "rename",
                FieldType::link(old.entity_type()),
                schema.type_name(new.entity_type()),
            ));
        }
        self.transact("rename", |b| Ok(b.propagate_rename(old, new)? > 0))
    }

    pub(crate) fn insert_record(&mut self, data: EntityData) -> Result<EntityId> {
        let schema = Arc::clone(self.schema());
        let shape = schema.shape(data.entity_type())?;
        if data.fields().len() != shape.fields().len() {
            return Err(Error::internal(format!(
                "{} expects {} fields, got {}",
                shape.name(),
                shape.fields().len(),
                data.fields().len()
            )));
        }
        for (index, value) in data.fields().iter().enumerate() {
            schema.check_field(shape, index, value)?;
        }

        let key = shape.symbolic_key(|i| data.field(i));
        if let Some(key) = &key {
            self.resolve_key_conflict(key, None)?;
        }

        let id = self.state.entities.spawn(data.clone())?;
        if let Some(key) = key {
            self.state.symbolic_ids.insert(key, id);
        }
        let links = soft_link::links_of(&schema, shape, &data);
        self.state.soft_links.index(id, &links);
        self.state.sources.insert(data.source(), id);
        self.changes.added(id, data);
        self.dirty.insert(id);
        self.modification_count += 1;
        tracing::trace!(entity = ?id, links = links.len(), "entity added");
        Ok(id)
    }

    fn resolve_key_conflict(&mut self, key: &SymbolicKey, owner: Option<EntityId>) -> Result<()> {
        let Some(existing) = self.state.symbolic_ids.get(key) else {
            return Ok(());
        };
        if Some(existing) == owner {
            return Ok(());
        }
        match self.config().on_key_conflict {
            OnKeyConflict::Error => Err(Error::duplicate_key(key.to_string())),
            OnKeyConflict::Replace => {
                tracing::warn!(
                    key = %key,
                    replaced = ?existing,
                    "symbolic key already taken; removing the existing entity"
                );
                let removed = self.remove_cascade(existing)?;
                if owner.is_some_and(|id| removed.contains(&id)) {
                    return Err(Error::duplicate_key(format!(
                        "{key} is held by an ancestor of the entity taking it"
                    )));
                }
                Ok(())
            }
        }
    }

    fn replace_record(&mut self, id: EntityId, new: EntityData) -> Result<()> {
        let old = self.state.entities.require(id)?.clone();
        if old == new {
            return Ok(());
        }
        let schema = Arc::clone(self.schema());
        let shape = schema.shape(id.entity_type())?;

        let old_key = self.state.symbolic_ids.key_of(id).cloned();
        let new_key = shape.symbolic_key(|i| new.field(i));
        if new_key != old_key {
            if let Some(key) = &new_key {
                self.resolve_key_conflict(key, Some(id))?;
            }
        }

        self.state.entities.replace(id, new.clone())?;

        if new_key != old_key {
            self.state.symbolic_ids.remove_id(id);
            if let Some(key) = &new_key {
                self.state.symbolic_ids.insert(key.clone(), id);
            }
        }

        if shape.carries_links() {
            let previous = soft_link::links_of(&schema, shape, &old);
            let current = soft_link::links_of(&schema, shape, &new);
            let delta = self.state.soft_links.reindex(id, &previous, &current);
            tracing::trace!(
                entity = ?id,
                added = delta.added,
                removed = delta.removed,
                "soft links reindexed"
            );
        }

        if old.source() != new.source() {
            self.state.sources.remove(old.source(), id);
            self.state.sources.insert(new.source(), id);
        }

        self.changes.replaced(id, &old, new);
        self.dirty.insert(id);
        self.modification_count += 1;

        if let (Some(old_key), Some(new_key)) = (&old_key, &new_key) {
            if old_key != new_key && self.config().propagate_renames {
                self.propagate_rename(old_key, new_key)?;
            }
        }
        Ok(())
    }

    /// Rewrites links to `old` in every referrer. Returns how many changed.
    fn propagate_rename(&mut self, old: &SymbolicKey, new: &SymbolicKey) -> Result<usize> {
        let schema = Arc::clone(self.schema());
        let referrers: Vec<EntityId> = self.state.soft_links.referrers(old).collect();
        let mut rewritten = 0;
        for referrer in referrers {
            let data = self.state.entities.require(referrer)?.clone();
            let shape = schema.shape(referrer.entity_type())?;
            if let Some(updated) = soft_link::rename_links(&schema, shape, &data, old, new) {
                self.replace_record(referrer, updated)?;
                rewritten += 1;
            }
        }
        tracing::debug!(from = %old, to = %new, referrers = rewritten, "soft links renamed");
        Ok(rewritten)
    }

    fn remove_cascade(&mut self, root: EntityId) -> Result<Vec<EntityId>> {
        self.state.entities.validate(root)?;

        let mut order = vec![root];
        let mut seen: HashSet<EntityId> = HashSet::from([root]);
        if self.config().cascade_removal {
            let mut queue = VecDeque::from([root]);
            while let Some(id) = queue.pop_front() {
                for child in self.state.relations.children_in_any(id) {
                    if seen.insert(child) {
                        order.push(child);
                        queue.push_back(child);
                    }
                }
            }
        }

        let schema = Arc::clone(self.schema());
        let mut survivors = Vec::new();
        for &id in &order {
            let data = self.state.entities.remove(id)?;
            let edges = self.state.relations.remove_entity(id);
            survivors.extend(
                edges
                    .touched()
                    .into_iter()
                    .filter(|other| !seen.contains(other)),
            );

            self.state.symbolic_ids.remove_id(id);
            let shape = schema.shape(id.entity_type())?;
            self.state
                .soft_links
                .unindex(id, &soft_link::links_of(&schema, shape, &data));
            self.state.sources.remove(data.source(), id);
            self.changes.removed(id, &data);
            self.dirty.remove(&id);
            self.modification_count += 1;
        }

        for id in survivors {
            self.mark_relinked(id);
        }
        tracing::trace!(root = ?root, removed = order.len(), "entities removed");
        Ok(order)
    }

    fn mark_relinked(&mut self, id: EntityId) {
        if let Some(data) = self.state.entities.get(id) {
            self.changes.relinked(id, data);
            self.dirty.insert(id);
        }
    }

    // ---------------------------------------------------------------------
    // Relations
    // ---------------------------------------------------------------------

    fn descriptor(&self, d: DescriptorId, one_to_many: bool) -> Result<RelationDescriptor> {
        let schema = self.schema();
        let descriptor = *schema.descriptor(d)?;
        if descriptor.kind.is_one_to_many() != one_to_many {
            let expected = if one_to_many { "one-to-many" } else { "one-to-one" };
            return Err(Error::relation_mismatch(
                schema.describe(d),
                format!("expected a {expected} relation"),
            ));
        }
        Ok(descriptor)
    }

    fn check_endpoints(
        &self,
        d: DescriptorId,
        descriptor: &RelationDescriptor,
        parent: Option<EntityId>,
        child: Option<EntityId>,
    ) -> Result<()> {
        let schema = self.schema();
        if let Some(parent) = parent {
            self.state.entities.validate(parent)?;
            if !schema.accepts_parent(descriptor, parent.entity_type()) {
                return Err(Error::relation_mismatch(
                    schema.describe(d),
                    format!("{} cannot be the parent", schema.type_name(parent.entity_type())),
                ));
            }
        }
        if let Some(child) = child {
            self.state.entities.validate(child)?;
            if !schema.accepts_child(descriptor, child.entity_type()) {
                return Err(Error::relation_mismatch(
                    schema.describe(d),
                    format!("{} cannot be the child", schema.type_name(child.entity_type())),
                ));
            }
        }
        if let (Some(parent), Some(child)) = (parent, child) {
            if self.state.relations.is_ancestor(d, child, parent) {
                return Err(Error::relation_mismatch(
                    schema.describe(d),
                    format!("{child:?} is an ancestor of {parent:?}"),
                ));
            }
        }
        Ok(())
    }

    fn record_delta(&mut self, d: DescriptorId, delta: &EdgeDelta) {
        if delta.is_empty() {
            return;
        }
        for id in delta.touched() {
            self.mark_relinked(id);
        }
        self.modification_count += 1;
        tracing::trace!(
            relation = %self.schema().describe(d),
            attached = delta.attached.len(),
            detached = delta.detached.len(),
            reordered = delta.reordered,
            "relation edited"
        );
    }

    pub(crate) fn link_one_to_one(
        &mut self,
        d: DescriptorId,
        parent: EntityId,
        child: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let descriptor = self.descriptor(d, false)?;
        self.check_endpoints(d, &descriptor, Some(parent), child)?;
        let delta = self.state.relations.set_one_to_one(d, parent, child);
        self.record_delta(d, &delta);
        Ok(delta)
    }

    fn link_one_to_one_parent(
        &mut self,
        d: DescriptorId,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let descriptor = self.descriptor(d, false)?;
        self.check_endpoints(d, &descriptor, parent, Some(child))?;
        let delta = self.state.relations.set_one_to_one_parent(d, child, parent);
        self.record_delta(d, &delta);
        Ok(delta)
    }

    pub(crate) fn link_parent(
        &mut self,
        d: DescriptorId,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let descriptor = self.descriptor(d, true)?;
        if parent.is_none() && descriptor.is_mandatory() {
            return Err(Error::relation_mismatch(
                self.schema().describe(d),
                "the parent of a mandatory relation cannot be cleared",
            ));
        }
        self.check_endpoints(d, &descriptor, parent, Some(child))?;
        let delta = self.state.relations.set_parent(d, child, parent);
        self.record_delta(d, &delta);
        Ok(delta)
    }

    pub(crate) fn link_children(
        &mut self,
        d: DescriptorId,
        parent: EntityId,
        children: &[EntityId],
    ) -> Result<EdgeDelta> {
        let descriptor = self.descriptor(d, true)?;
        self.check_endpoints(d, &descriptor, Some(parent), None)?;
        let mut seen = HashSet::with_capacity(children.len());
        for &child in children {
            if !seen.insert(child) {
                return Err(Error::relation_mismatch(
                    self.schema().describe(d),
                    format!("{child:?} listed twice"),
                ));
            }
            self.check_endpoints(d, &descriptor, Some(parent), Some(child))?;
        }
        let delta = self.state.relations.set_children(d, parent, children);
        if delta.reordered {
            self.mark_relinked(parent);
        }
        self.record_delta(d, &delta);
        Ok(delta)
    }

    /// Sets (or clears) the child of a one-to-one parent.
    ///
    /// The parent's previous child and the child's previous parent are both
    /// detached.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if `d` is not one-to-one, an endpoint type
    /// does not fit, or the edge would form a cycle.
    pub fn set_one_to_one(
        &mut self,
        d: DescriptorId,
        parent: impl EntityRef,
        child: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let parent = self.resolve_ref(&parent)?;
        self.transact("set_one_to_one", |b| b.link_one_to_one(d, parent, child))
    }

    /// Sets (or clears) the parent of a one-to-one child.
    ///
    /// # Errors
    ///
    /// As [`Builder::set_one_to_one`].
    pub fn set_one_to_one_parent(
        &mut self,
        d: DescriptorId,
        child: impl EntityRef,
        parent: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let child = self.resolve_ref(&child)?;
        self.transact("set_one_to_one_parent", |b| {
            b.link_one_to_one_parent(d, child, parent)
        })
    }

    /// Moves a one-to-many child to the end of `parent`'s list.
    ///
    /// Passing `None` clears the parent, which only optional relations
    /// allow.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if `d` is not one-to-many, an endpoint
    /// type does not fit, the edge would form a cycle, or a mandatory parent
    /// would be cleared.
    pub fn set_one_to_many_parent(
        &mut self,
        d: DescriptorId,
        child: impl EntityRef,
        parent: Option<EntityId>,
    ) -> Result<EdgeDelta> {
        let child = self.resolve_ref(&child)?;
        self.transact("set_one_to_many_parent", |b| b.link_parent(d, child, parent))
    }

    /// Appends a child to a one-to-many parent.
    ///
    /// A child already under `parent` keeps its position.
    ///
    /// # Errors
    ///
    /// As [`Builder::set_one_to_many_parent`].
    pub fn add_child(
        &mut self,
        d: DescriptorId,
        parent: impl EntityRef,
        child: impl EntityRef,
    ) -> Result<EdgeDelta> {
        let parent = self.resolve_ref(&parent)?;
        let child = self.resolve_ref(&child)?;
        self.transact("add_child", |b| b.link_parent(d, child, Some(parent)))
    }

    /// Replaces the ordered children of a one-to-many parent.
    ///
    /// Dropped children lose their edge; new children leave their previous
    /// parent. Setting the list a parent already has changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if `d` is not one-to-many, a child is
    /// listed twice, a type does not fit, or an edge would form a cycle.
    pub fn set_children(
        &mut self,
        d: DescriptorId,
        parent: impl EntityRef,
        children: &[EntityId],
    ) -> Result<EdgeDelta> {
        let parent = self.resolve_ref(&parent)?;
        self.transact("set_children", |b| b.link_children(d, parent, children))
    }

    // ---------------------------------------------------------------------
    // Validation and commit
    // ---------------------------------------------------------------------

    /// Checks that an entity has every required field and mandatory parent.
    ///
    /// # Errors
    ///
    /// Returns `UninitializedField` naming the first missing field or
    /// relation.
    pub fn validate(&self, target: impl EntityRef) -> Result<()> {
        let id = self.resolve_ref(&target)?;
        self.validate_id(id)
    }

    fn validate_id(&self, id: EntityId) -> Result<()> {
        let schema = self.schema();
        let data = self.state.entities.require(id)?;
        let shape = schema.shape(id.entity_type())?;
        if let Some(field) = shape.first_missing(|i| data.field(i)) {
            return Err(Error::uninitialized(shape.name(), field)
                .with_context(ErrorContext::new().with_entity(id)));
        }
        for &d in schema.child_relations(id.entity_type()) {
            let descriptor = schema.descriptor(d)?;
            if descriptor.is_mandatory() && self.state.relations.parent(d, id).is_none() {
                return Err(Error::uninitialized(shape.name(), schema.describe(d))
                    .with_context(ErrorContext::new().with_entity(id)));
            }
        }
        Ok(())
    }

    /// Folds the builder into a new snapshot.
    ///
    /// All-or-nothing: on error the base snapshot is unchanged and the
    /// builder stays open. After success every further mutation fails with
    /// `ModificationNotAllowed`.
    ///
    /// # Errors
    ///
    /// Returns `UninitializedField` if an added or edited entity is
    /// incomplete, or any consistency error when checks are enabled.
    pub fn commit(&mut self) -> Result<Snapshot> {
        self.check_open()?;
        for &id in &self.dirty {
            if self.state.entities.exists(id) {
                self.validate_id(id).map_err(|err| err.in_operation("commit"))?;
            }
        }
        let schema = Arc::clone(self.schema());
        if self.config().consistency_checks {
            consistency::check(&schema, &self.state).map_err(|err| err.in_operation("commit"))?;
        }

        self.session.mark_committed();
        let version = self.base.version() + 1;
        let (mut added, mut replaced, mut removed) = (0usize, 0usize, 0usize);
        for (_, entry) in self.changes.iter() {
            match entry {
                ChangeEntry::Added(_) => added += 1,
                ChangeEntry::Replaced { .. } => replaced += 1,
                ChangeEntry::Removed(_) => removed += 1,
            }
        }
        tracing::debug!(version, added, replaced, removed, "builder committed");

        Ok(Snapshot::from_parts(
            schema,
            self.config().clone(),
            self.state.clone(),
            version,
        ))
    }

    // ---------------------------------------------------------------------
    // Change tracking
    // ---------------------------------------------------------------------

    /// Per-entity changes against the base snapshot, in id order.
    #[must_use]
    pub fn collect_changes(&self) -> Vec<EntityChange> {
        self.changes.to_changes()
    }

    /// Returns true if any change is recorded.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Forgets the recorded changes; the edits themselves stay.
    ///
    /// Commit still validates every entity edited before the reset.
    pub fn reset_changes(&mut self) {
        self.changes.clear();
    }

    /// Number of successful primitive edits so far.
    #[must_use]
    pub fn modification_count(&self) -> u64 {
        self.modification_count
    }

    /// Returns true if the builder's entities match the base snapshot.
    ///
    /// Compares records and relations directly, so the answer does not
    /// depend on the change log. An entity removed and re-added with an
    /// equal record counts as the same entity, as long as its relations
    /// also match.
    #[must_use]
    pub fn has_same_entities(&self) -> bool {
        if self.modification_count == 0 {
            return true;
        }
        let base_records = &self.base.state().entities;
        let records = &self.state.entities;
        if base_records.len() != records.len() {
            return false;
        }

        // Base records with no equal record under the same id
        let mut unmatched: HashMap<&EntityData, Vec<EntityId>> = HashMap::new();
        for (id, data) in base_records.iter() {
            if records.get(id) != Some(data) {
                unmatched.entry(data).or_default().push(id);
            }
        }

        // Current id -> base id
        let mut pairs: HashMap<EntityId, EntityId> = HashMap::new();
        for (id, data) in records.iter() {
            if base_records.get(id) == Some(data) {
                continue;
            }
            match unmatched.get_mut(data).and_then(Vec::pop) {
                Some(base_id) => {
                    pairs.insert(id, base_id);
                }
                None => return false,
            }
        }

        let map = |id: EntityId| pairs.get(&id).copied().unwrap_or(id);
        let schema = self.schema();
        let (base, current) = (self.base.view(), self.view());
        records
            .iter()
            .all(|(id, _)| same_relations(schema, base, current, id, map(id), &map))
    }
}

fn same_relations(
    schema: &Schema,
    base: StorageView<'_>,
    current: StorageView<'_>,
    id: EntityId,
    base_id: EntityId,
    map: &impl Fn(EntityId) -> EntityId,
) -> bool {
    let ty = id.entity_type();
    let parents_match = schema
        .child_relations(ty)
        .iter()
        .all(|&d| current.parent(d, id).map(map) == base.parent(d, base_id));
    let children_match = schema.parent_relations(ty).iter().all(|&d| {
        let now: Vec<EntityId> = current.children(d, id).into_iter().map(map).collect();
        now == base.children(d, base_id)
    });
    parents_match && children_match
}

impl EntityStorage for Builder {
    fn view(&self) -> StorageView<'_> {
        StorageView::new(self.base.schema(), &self.state)
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("session", &self.session.id())
            .field("base_version", &self.base.version())
            .field("entities", &self.state.entities.len())
            .field("changes", &self.changes.len())
            .field("modifications", &self.modification_count)
            .finish()
    }
}
