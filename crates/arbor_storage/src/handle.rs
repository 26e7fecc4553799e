//! Detached entity handles.
//!
//! A handle is an entity that does not live in any store yet. Its fields
//! and relation edges are buffered in the handle itself; attaching it to a
//! builder assigns an id, inserts every detached entity wired to it, and
//! flushes the buffered edges. Afterwards the handle is bound to that
//! builder and works as an [`EntityRef`](crate::EntityRef) there.
//!
//! Buffered edges are kept on both ends. The end that was edited last holds
//! its counterpart strongly, the other end weakly, so a wired subgraph stays
//! alive through whichever handle the caller keeps.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use arbor_foundation::{EntityId, EntitySource, EntityTypeId, Error, Result, Value};
use parking_lot::Mutex;

use crate::builder::{Builder, Session};
use crate::record::EntityData;
use crate::registry::{DescriptorId, RelationDescriptor};
use crate::schema::{EntityShape, Schema};

/// Lifecycle state of a handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityState {
    /// Not in any store; fields and edges are buffered.
    Detached,
    /// Inserted into a builder that has not committed yet.
    Attached,
    /// Inserted into a builder that has committed.
    Committed,
}

/// A shareable handle to an entity that may not be stored yet.
///
/// Clones share the same entity. Equality is identity.
#[derive(Clone)]
pub struct EntityHandle(Arc<HandleInner>);

struct HandleInner {
    schema: Arc<Schema>,
    ty: EntityTypeId,
    binding: Mutex<Binding>,
}

enum Binding {
    Detached(Draft),
    Bound { session: Arc<Session>, id: EntityId },
}

struct Draft {
    source: EntitySource,
    fields: Vec<Value>,
    pending: PendingLinks,
}

/// Buffered edges keyed by descriptor and direction.
#[derive(Default)]
struct PendingLinks {
    parents: HashMap<DescriptorId, PendingRef>,
    children: HashMap<DescriptorId, Vec<PendingRef>>,
}

enum PendingRef {
    Owned(EntityHandle),
    Back(Weak<HandleInner>),
}

impl PendingRef {
    fn upgrade(&self) -> Option<EntityHandle> {
        match self {
            Self::Owned(handle) => Some(handle.clone()),
            Self::Back(weak) => weak.upgrade().map(EntityHandle),
        }
    }

    fn points_at(&self, target: &Arc<HandleInner>) -> bool {
        match self {
            Self::Owned(handle) => Arc::ptr_eq(&handle.0, target),
            Self::Back(weak) => std::ptr::eq(weak.as_ptr(), Arc::as_ptr(target)),
        }
    }
}

impl EntityHandle {
    /// Creates a detached entity with default field values.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown or abstract.
    pub fn new(schema: &Arc<Schema>, ty: EntityTypeId, source: impl Into<EntitySource>) -> Result<Self> {
        if schema.is_abstract(ty) {
            return Err(Error::schema_conflict(format!(
                "abstract type {} cannot be instantiated",
                schema.type_name(ty)
            )));
        }
        let fields = schema.shape(ty)?.initial_fields();
        Ok(Self(Arc::new(HandleInner {
            schema: Arc::clone(schema),
            ty,
            binding: Mutex::new(Binding::Detached(Draft {
                source: source.into(),
                fields,
                pending: PendingLinks::default(),
            })),
        })))
    }

    /// Creates a detached entity from field values and candidate parents.
    ///
    /// Each parent is wired through the first relation of this type that
    /// accepts the parent's type and is not taken by an earlier parent.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` or `TypeMismatch` for bad fields, and
    /// `RelationMismatch` if no relation fits a parent.
    pub fn create(
        schema: &Arc<Schema>,
        ty: EntityTypeId,
        source: impl Into<EntitySource>,
        fields: &[(&str, Value)],
        parents: &[&EntityHandle],
    ) -> Result<Self> {
        let handle = Self::new(schema, ty, source)?;
        for (name, value) in fields {
            handle.set(name, value.clone())?;
        }

        let mut taken = HashSet::new();
        for parent in parents {
            let d = schema
                .child_relations(ty)
                .iter()
                .copied()
                .find(|d| {
                    !taken.contains(d)
                        && schema
                            .descriptor(*d)
                            .is_ok_and(|desc| schema.accepts_parent(desc, parent.entity_type()))
                })
                .ok_or_else(|| {
                    Error::relation_mismatch(
                        format!("{} -> {}", schema.type_name(parent.entity_type()), schema.type_name(ty)),
                        "no relation accepts this parent",
                    )
                })?;
            taken.insert(d);
            handle.set_parent(d, Some(parent))?;
        }
        Ok(handle)
    }

    /// Creates a detached copy of a stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not fit the schema.
    pub fn from_record(schema: &Arc<Schema>, data: &EntityData) -> Result<Self> {
        let handle = Self::new(schema, data.entity_type(), data.source().clone())?;
        let shape = schema.shape(data.entity_type())?;
        for (index, value) in data.fields().iter().enumerate() {
            schema.check_field(shape, index, value)?;
        }
        handle.with_draft(|draft| {
            draft.fields = data.fields().iter().cloned().collect();
            Ok(())
        })?;
        Ok(handle)
    }

    /// Returns the concrete type.
    #[must_use]
    pub fn entity_type(&self) -> EntityTypeId {
        self.0.ty
    }

    /// Returns the schema the handle was created with.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.0.schema
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        match &*self.0.binding.lock() {
            Binding::Detached(_) => EntityState::Detached,
            Binding::Bound { session, .. } if session.is_committed() => EntityState::Committed,
            Binding::Bound { .. } => EntityState::Attached,
        }
    }

    /// Returns the id once attached.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        match &*self.0.binding.lock() {
            Binding::Detached(_) => None,
            Binding::Bound { id, .. } => Some(*id),
        }
    }

    fn shape(&self) -> Result<&EntityShape> {
        self.0.schema.shape(self.0.ty)
    }

    fn type_name(&self) -> &str {
        self.0.schema.type_name(self.0.ty)
    }

    fn with_draft<T>(&self, f: impl FnOnce(&mut Draft) -> Result<T>) -> Result<T> {
        match &mut *self.0.binding.lock() {
            Binding::Detached(draft) => f(draft),
            Binding::Bound { .. } => Err(Error::modification_not_allowed(
                self.type_name(),
                "the entity is attached; edit it through its builder",
            )),
        }
    }

    /// Sets a field of a detached entity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField`, `TypeMismatch`, or `ModificationNotAllowed`
    /// once attached.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        let shape = self.shape()?;
        let index = shape.require_field(field)?;
        let value = value.into();
        self.0.schema.check_field(shape, index, &value)?;
        self.with_draft(|draft| {
            draft.fields[index] = value;
            Ok(())
        })
    }

    /// Returns a buffered field value, or `None` once attached.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the type declares no such field.
    pub fn get(&self, field: &str) -> Result<Option<Value>> {
        let index = self.shape()?.require_field(field)?;
        match &*self.0.binding.lock() {
            Binding::Detached(draft) => Ok(draft.fields.get(index).cloned()),
            Binding::Bound { .. } => Ok(None),
        }
    }

    /// Replaces the provenance tag of a detached entity.
    ///
    /// # Errors
    ///
    /// Returns `ModificationNotAllowed` once attached.
    pub fn set_source(&self, source: impl Into<EntitySource>) -> Result<()> {
        let source = source.into();
        self.with_draft(|draft| {
            draft.source = source;
            Ok(())
        })
    }

    fn relation(&self, d: DescriptorId) -> Result<RelationDescriptor> {
        self.0.schema.descriptor(d).copied()
    }

    fn mismatch(&self, d: DescriptorId, reason: impl Into<String>) -> Error {
        Error::relation_mismatch(self.0.schema.describe(d), reason)
    }

    fn check_parent_side(&self, d: DescriptorId, descriptor: &RelationDescriptor) -> Result<()> {
        if self.0.schema.accepts_parent(descriptor, self.0.ty) {
            Ok(())
        } else {
            Err(self.mismatch(d, format!("{} cannot be the parent", self.type_name())))
        }
    }

    fn check_child_side(&self, d: DescriptorId, descriptor: &RelationDescriptor) -> Result<()> {
        if self.0.schema.accepts_child(descriptor, self.0.ty) {
            Ok(())
        } else {
            Err(self.mismatch(d, format!("{} cannot be the child", self.type_name())))
        }
    }

    fn check_same_schema(&self, other: &EntityHandle) -> Result<()> {
        if Arc::ptr_eq(&self.0.schema, &other.0.schema) {
            Ok(())
        } else {
            Err(Error::schema_conflict("handles were created with different schemas"))
        }
    }

    /// Sets (or clears) the buffered parent of a detached entity.
    ///
    /// Works for both relation kinds. For one-to-one relations the parent's
    /// previous child is detached from it.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if a type does not fit or the parent is
    /// this entity, and `ModificationNotAllowed` once attached.
    pub fn set_parent(&self, d: DescriptorId, parent: Option<&EntityHandle>) -> Result<()> {
        let descriptor = self.relation(d)?;
        self.check_child_side(d, &descriptor)?;
        if let Some(parent) = parent {
            self.check_same_schema(parent)?;
            parent.check_parent_side(d, &descriptor)?;
            if parent == self {
                return Err(self.mismatch(d, "an entity cannot be its own parent"));
            }
        }

        let previous = self.with_draft(|draft| {
            let previous = match parent {
                Some(parent) => draft
                    .pending
                    .parents
                    .insert(d, PendingRef::Owned(parent.clone())),
                None => draft.pending.parents.remove(&d),
            };
            Ok(previous)
        })?;

        let previous = previous.and_then(|p| p.upgrade());
        if previous.as_ref() == parent {
            return Ok(());
        }
        if let Some(previous) = previous {
            previous.forget_child(d, &self.0);
        }
        if let Some(parent) = parent {
            let weak = Arc::downgrade(&self.0);
            let evicted = parent.mirror_child(d, &descriptor, PendingRef::Back(weak));
            for child in evicted.into_iter().filter(|c| c != self) {
                child.forget_parent(d, &parent.0);
            }
        }
        Ok(())
    }

    /// Replaces the buffered children of a detached one-to-many parent.
    ///
    /// Children dropped from the list lose their buffered parent; new
    /// children leave their previous parent.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if `d` is not one-to-many, a type does
    /// not fit, or a child is listed twice or is this entity.
    pub fn set_children(&self, d: DescriptorId, children: &[&EntityHandle]) -> Result<()> {
        let descriptor = self.relation(d)?;
        if !descriptor.kind.is_one_to_many() {
            return Err(self.mismatch(d, "expected a one-to-many relation"));
        }
        self.check_parent_side(d, &descriptor)?;
        for (i, child) in children.iter().enumerate() {
            self.check_same_schema(child)?;
            child.check_child_side(d, &descriptor)?;
            if *child == self {
                return Err(self.mismatch(d, "an entity cannot be its own child"));
            }
            if children[..i].contains(child) {
                return Err(self.mismatch(d, "child listed twice"));
            }
        }
        self.replace_children(d, children)
    }

    fn replace_children(&self, d: DescriptorId, children: &[&EntityHandle]) -> Result<()> {
        let refs: Vec<PendingRef> = children
            .iter()
            .map(|c| PendingRef::Owned((*c).clone()))
            .collect();
        let previous = self.with_draft(|draft| {
            Ok(if refs.is_empty() {
                draft.pending.children.remove(&d)
            } else {
                draft.pending.children.insert(d, refs)
            })
        })?;

        for old in previous.unwrap_or_default() {
            if let Some(old) = old.upgrade() {
                if !children.contains(&&old) {
                    old.forget_parent(d, &self.0);
                }
            }
        }
        for child in children {
            let displaced = child.mirror_parent(d, PendingRef::Back(Arc::downgrade(&self.0)));
            if let Some(displaced) = displaced.and_then(|p| p.upgrade()) {
                if displaced != *self {
                    displaced.forget_child(d, &child.0);
                }
            }
        }
        Ok(())
    }

    /// Appends a buffered child to a detached one-to-many parent.
    ///
    /// # Errors
    ///
    /// As [`EntityHandle::set_children`].
    pub fn add_child(&self, d: DescriptorId, child: &EntityHandle) -> Result<()> {
        let mut children = self.pending_children(d);
        if children.contains(child) {
            return Ok(());
        }
        children.push(child.clone());
        let refs: Vec<&EntityHandle> = children.iter().collect();
        self.set_children(d, &refs)
    }

    /// Sets (or clears) the buffered child of a detached one-to-one parent.
    ///
    /// # Errors
    ///
    /// Returns `RelationMismatch` if `d` is not one-to-one or a type does
    /// not fit.
    pub fn set_child(&self, d: DescriptorId, child: Option<&EntityHandle>) -> Result<()> {
        let descriptor = self.relation(d)?;
        if descriptor.kind.is_one_to_many() {
            return Err(self.mismatch(d, "expected a one-to-one relation"));
        }
        self.check_parent_side(d, &descriptor)?;
        if let Some(child) = child {
            self.check_same_schema(child)?;
            child.check_child_side(d, &descriptor)?;
            if child == self {
                return Err(self.mismatch(d, "an entity cannot be its own child"));
            }
        }
        match child {
            Some(child) => self.replace_children(d, &[child]),
            None => self.replace_children(d, &[]),
        }
    }

    /// Buffered parent under `d`.
    #[must_use]
    pub fn pending_parent(&self, d: DescriptorId) -> Option<EntityHandle> {
        match &*self.0.binding.lock() {
            Binding::Detached(draft) => draft.pending.parents.get(&d).and_then(PendingRef::upgrade),
            Binding::Bound { .. } => None,
        }
    }

    /// Buffered children under `d`, in order.
    #[must_use]
    pub fn pending_children(&self, d: DescriptorId) -> Vec<EntityHandle> {
        match &*self.0.binding.lock() {
            Binding::Detached(draft) => draft
                .pending
                .children
                .get(&d)
                .map(|refs| refs.iter().filter_map(PendingRef::upgrade).collect())
                .unwrap_or_default(),
            Binding::Bound { .. } => Vec::new(),
        }
    }

    /// Records `child` in this handle's list without touching the child.
    /// Returns the children evicted from a one-to-one slot.
    fn mirror_child(
        &self,
        d: DescriptorId,
        descriptor: &RelationDescriptor,
        child: PendingRef,
    ) -> Vec<EntityHandle> {
        let mut binding = self.0.binding.lock();
        let Binding::Detached(draft) = &mut *binding else {
            return Vec::new();
        };
        let list = draft.pending.children.entry(d).or_default();
        if descriptor.kind.is_one_to_many() {
            list.push(child);
            return Vec::new();
        }
        let evicted = std::mem::replace(list, vec![child]);
        drop(binding);
        evicted.iter().filter_map(PendingRef::upgrade).collect()
    }

    /// Records `parent` on this handle without touching the parent.
    fn mirror_parent(&self, d: DescriptorId, parent: PendingRef) -> Option<PendingRef> {
        match &mut *self.0.binding.lock() {
            Binding::Detached(draft) => draft.pending.parents.insert(d, parent),
            Binding::Bound { .. } => None,
        }
    }

    fn forget_child(&self, d: DescriptorId, child: &Arc<HandleInner>) {
        let mut binding = self.0.binding.lock();
        if let Binding::Detached(draft) = &mut *binding {
            if let Some(list) = draft.pending.children.get_mut(&d) {
                let (removed, kept): (Vec<PendingRef>, Vec<PendingRef>) =
                    std::mem::take(list).into_iter().partition(|r| r.points_at(child));
                *list = kept;
                if list.is_empty() {
                    draft.pending.children.remove(&d);
                }
                drop(binding);
                drop(removed);
            }
        }
    }

    fn forget_parent(&self, d: DescriptorId, parent: &Arc<HandleInner>) {
        let mut binding = self.0.binding.lock();
        if let Binding::Detached(draft) = &mut *binding {
            if draft
                .pending
                .parents
                .get(&d)
                .is_some_and(|r| r.points_at(parent))
            {
                let removed = draft.pending.parents.remove(&d);
                drop(binding);
                drop(removed);
            }
        }
    }

    /// Checks buffered fields and mandatory parents of a detached entity.
    ///
    /// Bound entities are checked by their builder at commit.
    ///
    /// # Errors
    ///
    /// Returns `UninitializedField` naming the first missing field or
    /// relation.
    pub fn validate(&self) -> Result<()> {
        let schema = &self.0.schema;
        let shape = self.shape()?;
        let binding = self.0.binding.lock();
        let Binding::Detached(draft) = &*binding else {
            return Ok(());
        };
        if let Some(field) = shape.first_missing(|i| draft.fields.get(i)) {
            return Err(Error::uninitialized(shape.name(), field));
        }
        for &d in schema.child_relations(self.0.ty) {
            let mandatory = schema.descriptor(d)?.is_mandatory();
            let present = draft
                .pending
                .parents
                .get(&d)
                .and_then(PendingRef::upgrade)
                .is_some();
            if mandatory && !present {
                return Err(Error::uninitialized(shape.name(), schema.describe(d)));
            }
        }
        Ok(())
    }

    /// The id this handle has in `session`'s builder.
    pub(crate) fn bound_id(&self, session: &Arc<Session>) -> Result<EntityId> {
        match &*self.0.binding.lock() {
            Binding::Bound { session: own, id } if own.id() == session.id() => Ok(*id),
            Binding::Bound { .. } => Err(Error::modification_not_allowed(
                self.type_name(),
                "the entity belongs to another builder",
            )),
            Binding::Detached(_) => Err(Error::modification_not_allowed(
                self.type_name(),
                "the entity is detached; attach it first",
            )),
        }
    }

    /// Returns the id in `session`, `None` if detached.
    fn binding_in(&self, session: &Arc<Session>) -> Result<Option<EntityId>> {
        match &*self.0.binding.lock() {
            Binding::Detached(_) => Ok(None),
            Binding::Bound { session: own, id } if own.id() == session.id() => Ok(Some(*id)),
            Binding::Bound { .. } => Err(Error::already_bound(self.type_name())),
        }
    }

    /// Inserts this entity into `builder`.
    ///
    /// Every detached entity reachable through buffered edges is inserted
    /// too, then the buffered edges are applied. Attaching a handle that is
    /// already attached to `builder` returns its id.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyBound` if this or a wired entity belongs to another
    /// builder, `SchemaConflict` if the schemas differ,
    /// `DuplicateSymbolicKey` if two wired entities share a key, and any
    /// relation error from applying the edges. On error nothing is attached.
    pub fn attach_to(&self, builder: &mut Builder) -> Result<EntityId> {
        builder.check_open()?;
        if !Arc::ptr_eq(&self.0.schema, builder.schema()) {
            return Err(Error::schema_conflict(
                "the handle was created with another schema",
            ));
        }
        if let Some(id) = self.binding_in(builder.session())? {
            return Ok(id);
        }

        let plan = AttachPlan::collect(self, builder.session())?;
        let ids = builder.transact("attach", |b| plan.apply(b))?;
        plan.bind(builder.session(), &ids);
        tracing::trace!(entities = ids.len(), "detached entities attached");
        ids.first()
            .copied()
            .ok_or_else(|| Error::internal("attach produced no entities"))
    }
}

/// One end of a buffered edge, resolved for attaching.
#[derive(Copy, Clone, Debug)]
enum Endpoint {
    Draft(usize),
    Existing(EntityId),
}

struct PlannedEntity {
    handle: EntityHandle,
    data: EntityData,
    parents: Vec<(DescriptorId, EntityHandle)>,
    children: Vec<(DescriptorId, Vec<EntityHandle>)>,
}

struct AttachPlan {
    entities: Vec<PlannedEntity>,
    endpoints: HashMap<*const HandleInner, Endpoint>,
}

impl AttachPlan {
    fn collect(root: &EntityHandle, session: &Arc<Session>) -> Result<Self> {
        let mut plan = Self {
            entities: Vec::new(),
            endpoints: HashMap::new(),
        };
        let mut queue = VecDeque::from([root.clone()]);
        let mut drafts = 1;
        plan.endpoints.insert(Arc::as_ptr(&root.0), Endpoint::Draft(0));

        while let Some(handle) = queue.pop_front() {
            let planned = {
                let binding = handle.0.binding.lock();
                let Binding::Detached(draft) = &*binding else {
                    return Err(Error::internal("planned entity is no longer detached"));
                };
                PlannedEntity {
                    handle: handle.clone(),
                    data: EntityData::new(handle.0.ty, draft.source.clone(), draft.fields.clone()),
                    parents: draft
                        .pending
                        .parents
                        .iter()
                        .filter_map(|(d, r)| r.upgrade().map(|p| (*d, p)))
                        .collect(),
                    children: draft
                        .pending
                        .children
                        .iter()
                        .map(|(d, refs)| (*d, refs.iter().filter_map(PendingRef::upgrade).collect()))
                        .collect(),
                }
            };

            let neighbors = planned
                .parents
                .iter()
                .map(|(_, p)| p)
                .chain(planned.children.iter().flat_map(|(_, c)| c.iter()));
            for neighbor in neighbors {
                let ptr = Arc::as_ptr(&neighbor.0);
                if plan.endpoints.contains_key(&ptr) {
                    continue;
                }
                handle.check_same_schema(neighbor)?;
                let endpoint = match neighbor.binding_in(session)? {
                    Some(id) => Endpoint::Existing(id),
                    None => {
                        queue.push_back(neighbor.clone());
                        drafts += 1;
                        Endpoint::Draft(drafts - 1)
                    }
                };
                plan.endpoints.insert(ptr, endpoint);
            }
            plan.entities.push(planned);
        }
        plan.check_keys(root.schema())?;
        Ok(plan)
    }

    fn check_keys(&self, schema: &Schema) -> Result<()> {
        let mut seen = HashSet::new();
        for planned in &self.entities {
            let shape = schema.shape(planned.data.entity_type())?;
            if let Some(key) = shape.symbolic_key(|i| planned.data.field(i)) {
                if !seen.insert(key.clone()) {
                    return Err(Error::duplicate_key(format!(
                        "{key} is held by two detached entities"
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, handle: &EntityHandle, ids: &[EntityId]) -> Result<EntityId> {
        match self.endpoints.get(&Arc::as_ptr(&handle.0)) {
            Some(Endpoint::Draft(i)) => ids
                .get(*i)
                .copied()
                .ok_or_else(|| Error::internal("attach plan out of order")),
            Some(Endpoint::Existing(id)) => Ok(*id),
            None => Err(Error::internal("handle missing from attach plan")),
        }
    }

    fn apply(&self, builder: &mut Builder) -> Result<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(self.entities.len());
        for planned in &self.entities {
            ids.push(builder.insert_record(planned.data.clone())?);
        }

        let schema = Arc::clone(builder.schema());
        for (planned, &child) in self.entities.iter().zip(&ids) {
            for (d, parent) in &planned.parents {
                let parent = self.resolve(parent, &ids)?;
                if schema.descriptor(*d)?.kind.is_one_to_many() {
                    builder.link_parent(*d, child, Some(parent))?;
                } else {
                    builder.link_one_to_one(*d, parent, Some(child))?;
                }
            }
        }
        for (planned, &parent) in self.entities.iter().zip(&ids) {
            for (d, children) in &planned.children {
                let children = children
                    .iter()
                    .map(|c| self.resolve(c, &ids))
                    .collect::<Result<Vec<_>>>()?;
                if schema.descriptor(*d)?.kind.is_one_to_many() {
                    builder.link_children(*d, parent, &children)?;
                } else {
                    builder.link_one_to_one(*d, parent, children.first().copied())?;
                }
            }
        }
        Ok(ids)
    }

    fn bind(&self, session: &Arc<Session>, ids: &[EntityId]) {
        for (planned, &id) in self.entities.iter().zip(ids) {
            let previous = std::mem::replace(
                &mut *planned.handle.0.binding.lock(),
                Binding::Bound {
                    session: Arc::clone(session),
                    id,
                },
            );
            drop(previous);
        }
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EntityHandle {}

impl std::hash::Hash for EntityHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("type", &self.type_name())
            .field("state", &self.state())
            .field("id", &self.id())
            .finish()
    }
}
