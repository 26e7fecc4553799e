//! Soft links: symbolic-key references held anywhere in a record's fields.
//!
//! One schema-driven walker serves both enumeration and renaming, so the
//! two always visit the same positions: links directly in a field, inside
//! optionals, lists, sets, map keys and values, and variant payloads to any
//! depth. Subtrees whose declared type cannot hold a link are skipped.
//! `Any`-typed positions are walked structurally.

use std::collections::HashSet;
use std::sync::Arc;

use arbor_foundation::{ArMap, EntityId, FieldType, SymbolicKey, Value, Variant};

use crate::record::EntityData;
use crate::schema::{EntityShape, Schema};

#[derive(Clone, Copy)]
enum Side {
    Key,
    Value,
}

/// Rebuilds a sequence only if some element was rewritten.
fn rewrite_seq<'v, I, G>(items: I, mut rewrite: G) -> Option<Vec<Value>>
where
    I: IntoIterator<Item = &'v Value>,
    G: FnMut(usize, &Value) -> Option<Value>,
{
    let items: Vec<&Value> = items.into_iter().collect();
    let mut out: Option<Vec<Value>> = None;
    for (i, item) in items.iter().enumerate() {
        let new = rewrite(i, item);
        if let Some(buffer) = out.as_mut() {
            buffer.push(new.unwrap_or_else(|| (*item).clone()));
        } else if let Some(new) = new {
            let mut fresh: Vec<Value> = items[..i].iter().map(|v| (*v).clone()).collect();
            fresh.push(new);
            out = Some(fresh);
        }
    }
    out
}

fn rewrite_pairs<G>(entries: &ArMap<Value, Value>, mut rewrite: G) -> Option<Value>
where
    G: FnMut(Side, &Value) -> Option<Value>,
{
    let mut changed = false;
    let mut out = Vec::with_capacity(entries.len());
    for (k, v) in entries.iter() {
        let new_key = rewrite(Side::Key, k);
        let new_value = rewrite(Side::Value, v);
        changed |= new_key.is_some() || new_value.is_some();
        out.push((
            new_key.unwrap_or_else(|| k.clone()),
            new_value.unwrap_or_else(|| v.clone()),
        ));
    }
    changed.then(|| Value::map(out))
}

fn rebuild_variant(variant: &Variant, fields: Vec<Value>) -> Value {
    Value::Variant(Variant::new(Arc::clone(&variant.tag), fields))
}

/// Visits every link in `value`, replacing it where `visit` returns a key.
///
/// Returns the rewritten value, or `None` when nothing changed.
pub(crate) fn walk<F>(schema: &Schema, ty: &FieldType, value: &Value, visit: &mut F) -> Option<Value>
where
    F: FnMut(&SymbolicKey) -> Option<SymbolicKey>,
{
    if value.is_nil() || !schema.carries_links(ty) {
        return None;
    }
    match (ty, value) {
        (FieldType::Any, _) => walk_untyped(value, visit),
        (FieldType::Option(inner), _) => walk(schema, inner, value, visit),
        (FieldType::Link(_), Value::Link(key)) => visit(key).map(Value::Link),
        (FieldType::List(inner), Value::List(items)) => {
            rewrite_seq(items, |_, item| walk(schema, inner, item, visit)).map(Value::list)
        }
        (FieldType::Set(inner), Value::Set(items)) => {
            rewrite_seq(items.iter(), |_, item| walk(schema, inner, item, visit)).map(Value::set)
        }
        (FieldType::Map(kt, vt), Value::Map(entries)) => rewrite_pairs(entries, |side, v| match side {
            Side::Key => walk(schema, kt, v, visit),
            Side::Value => walk(schema, vt, v, visit),
        }),
        (FieldType::Variant(id), Value::Variant(variant)) => {
            let alt = schema.variant(*id)?.alternative(&variant.tag)?;
            rewrite_seq(variant.fields.iter(), |i, field| {
                walk(schema, alt.fields.get(i)?, field, visit)
            })
            .map(|fields| rebuild_variant(variant, fields))
        }
        _ => None,
    }
}

fn walk_untyped<F>(value: &Value, visit: &mut F) -> Option<Value>
where
    F: FnMut(&SymbolicKey) -> Option<SymbolicKey>,
{
    match value {
        Value::Link(key) => visit(key).map(Value::Link),
        Value::List(items) => {
            rewrite_seq(items, |_, item| walk_untyped(item, visit)).map(Value::list)
        }
        Value::Set(items) => {
            rewrite_seq(items.iter(), |_, item| walk_untyped(item, visit)).map(Value::set)
        }
        Value::Map(entries) => rewrite_pairs(entries, |_, v| walk_untyped(v, visit)),
        Value::Variant(variant) => {
            rewrite_seq(variant.fields.iter(), |_, field| walk_untyped(field, visit))
                .map(|fields| rebuild_variant(variant, fields))
        }
        _ => None,
    }
}

/// Collects every symbolic key a record refers to.
pub(crate) fn links_of(schema: &Schema, shape: &EntityShape, data: &EntityData) -> HashSet<SymbolicKey> {
    let mut links = HashSet::new();
    if !shape.carries_links() {
        return links;
    }
    for (field, value) in shape.fields().iter().zip(data.fields().iter()) {
        walk(schema, &field.ty, value, &mut |key: &SymbolicKey| {
            links.insert(key.clone());
            None
        });
    }
    links
}

/// Rewrites every occurrence of `old` into `new`.
///
/// Returns the new record, or `None` when the record holds no such link.
pub(crate) fn rename_links(
    schema: &Schema,
    shape: &EntityShape,
    data: &EntityData,
    old: &SymbolicKey,
    new: &SymbolicKey,
) -> Option<EntityData> {
    if !shape.carries_links() {
        return None;
    }
    let fields = rewrite_seq(data.fields(), |i, value| {
        let ty = &shape.fields().get(i)?.ty;
        walk(schema, ty, value, &mut |key: &SymbolicKey| {
            (key == old).then(|| new.clone())
        })
    })?;
    Some(data.with_fields(fields))
}

/// Counts of index entries touched by a reindex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct LinkDelta {
    pub added: usize,
    pub removed: usize,
}

/// Reverse index from symbolic keys to the entities that link to them.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SoftLinkIndex {
    referrers: im::HashMap<SymbolicKey, im::OrdSet<EntityId>>,
}

impl SoftLinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, key: &SymbolicKey, id: EntityId) {
        self.referrers.entry(key.clone()).or_default().insert(id);
    }

    fn remove(&mut self, key: &SymbolicKey, id: EntityId) {
        if let Some(ids) = self.referrers.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.referrers.remove(key);
            }
        }
    }

    /// Records every link of a newly added entity.
    pub fn index(&mut self, id: EntityId, links: &HashSet<SymbolicKey>) {
        for key in links {
            self.add(key, id);
        }
    }

    /// Drops every link of a removed entity.
    pub fn unindex(&mut self, id: EntityId, links: &HashSet<SymbolicKey>) {
        for key in links {
            self.remove(key, id);
        }
    }

    /// Applies only the difference between two link sets of one entity.
    pub fn reindex(
        &mut self,
        id: EntityId,
        previous: &HashSet<SymbolicKey>,
        current: &HashSet<SymbolicKey>,
    ) -> LinkDelta {
        let mut delta = LinkDelta::default();
        for key in previous.difference(current) {
            self.remove(key, id);
            delta.removed += 1;
        }
        for key in current.difference(previous) {
            self.add(key, id);
            delta.added += 1;
        }
        delta
    }

    /// Entities linking to `key`, in id order.
    pub fn referrers(&self, key: &SymbolicKey) -> impl Iterator<Item = EntityId> + '_ {
        self.referrers
            .get(key)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }
}
