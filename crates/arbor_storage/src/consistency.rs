//! Full-state consistency checking.
//!
//! Rebuilds every derived index from the records and compares, then checks
//! each edge and each entity against the schema. Linear in the size of the
//! store; opt-in per commit through `StoreConfig::consistency_checks`.

use arbor_foundation::{Error, Result};

use crate::index::{SourceIndex, SymbolicIdIndex};
use crate::schema::Schema;
use crate::soft_link::{self, SoftLinkIndex};
use crate::view::Indexes;

/// Checks a store state, returning the first violation found.
pub(crate) fn check(schema: &Schema, state: &Indexes) -> Result<()> {
    check_edges(schema, state)?;
    check_entities(schema, state)?;
    check_indexes(schema, state)
}

fn check_edges(schema: &Schema, state: &Indexes) -> Result<()> {
    if let Some(edge) = state.relations.find_asymmetry() {
        return Err(Error::dangling_relation(
            schema.describe(edge.descriptor),
            edge.child,
        ));
    }

    for edge in state.relations.iter() {
        let relation = schema.describe(edge.descriptor);
        for end in [edge.parent, edge.child] {
            if !state.entities.exists(end) {
                return Err(Error::dangling_relation(relation, end));
            }
        }

        let descriptor = schema.descriptor(edge.descriptor)?;
        if !schema.accepts_parent(descriptor, edge.parent.entity_type()) {
            return Err(Error::relation_mismatch(
                relation,
                format!("{} cannot be the parent", schema.type_name(edge.parent.entity_type())),
            ));
        }
        if !schema.accepts_child(descriptor, edge.child.entity_type()) {
            return Err(Error::relation_mismatch(
                relation,
                format!("{} cannot be the child", schema.type_name(edge.child.entity_type())),
            ));
        }
        if !descriptor.kind.is_one_to_many()
            && state.relations.children(edge.descriptor, edge.parent).count() > 1
        {
            return Err(Error::relation_mismatch(
                relation,
                format!("{:?} has several children", edge.parent),
            ));
        }
    }
    Ok(())
}

fn check_entities(schema: &Schema, state: &Indexes) -> Result<()> {
    for (id, data) in state.entities.iter() {
        let ty = id.entity_type();
        let shape = schema.shape(ty)?;
        if data.fields().len() != shape.fields().len() {
            return Err(Error::internal(format!(
                "{id:?} has {} fields, {} declares {}",
                data.fields().len(),
                shape.name(),
                shape.fields().len()
            )));
        }
        for (index, value) in data.fields().iter().enumerate() {
            schema.check_field(shape, index, value)?;
        }
        if let Some(field) = shape.first_missing(|i| data.field(i)) {
            return Err(Error::uninitialized(shape.name(), field));
        }
        for &d in schema.child_relations(ty) {
            let descriptor = schema.descriptor(d)?;
            if descriptor.is_mandatory() && state.relations.parent(d, id).is_none() {
                return Err(Error::uninitialized(shape.name(), schema.describe(d)));
            }
        }
    }
    Ok(())
}

fn check_indexes(schema: &Schema, state: &Indexes) -> Result<()> {
    let mut symbolic_ids = SymbolicIdIndex::new();
    let mut soft_links = SoftLinkIndex::new();
    let mut sources = SourceIndex::new();

    for (id, data) in state.entities.iter() {
        let shape = schema.shape(id.entity_type())?;
        if let Some(key) = shape.symbolic_key(|i| data.field(i)) {
            if let Some(other) = symbolic_ids.insert(key.clone(), id) {
                return Err(Error::duplicate_key(format!("{key} held by {other:?} and {id:?}")));
            }
        }
        soft_links.index(id, &soft_link::links_of(schema, shape, data));
        sources.insert(data.source(), id);
    }

    if symbolic_ids != state.symbolic_ids {
        return Err(Error::internal("symbolic-id index disagrees with records"));
    }
    if soft_links != state.soft_links {
        return Err(Error::internal("soft-link index disagrees with records"));
    }
    if sources != state.sources {
        return Err(Error::internal("source index disagrees with records"));
    }
    Ok(())
}
