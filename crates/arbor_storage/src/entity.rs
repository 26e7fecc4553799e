//! Entity records with per-type generational indices.
//!
//! Each concrete type has its own sequence space. Generations distinguish a
//! reused slot from the entity that held it before: odd generations are
//! alive, even generations are free.

use arbor_foundation::{EntityId, EntityTypeId, Error, Result};

use crate::record::EntityData;

/// Slot bookkeeping for one concrete type.
#[derive(Debug, Clone, Default)]
struct Family {
    generations: im::Vector<u32>,
    free_list: im::Vector<u32>,
}

/// Live records keyed by id, plus slot allocation state.
///
/// Every structure is persistent, so cloning a table is cheap and the clone
/// shares storage with the original until one side is edited.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntityTable {
    families: im::HashMap<EntityTypeId, Family>,
    records: im::OrdMap<EntityId, EntityData>,
}

impl EntityTable {
    /// Allocates an id for the record's type and stores the record.
    ///
    /// Reuses freed slots when available.
    pub fn spawn(&mut self, data: EntityData) -> Result<EntityId> {
        let ty = data.entity_type();
        let family = self.families.entry(ty).or_default();

        let id = if let Some(index) = family.free_list.pop_back() {
            let slot = index as usize;
            // Was even (free), now odd (alive)
            family.generations[slot] += 1;
            EntityId::new(ty, index, family.generations[slot])
        } else {
            let index = u32::try_from(family.generations.len())
                .map_err(|_| Error::internal(format!("sequence space exhausted for {ty}")))?;
            family.generations.push_back(1);
            EntityId::new(ty, index, 1)
        };

        self.records.insert(id, data);
        Ok(id)
    }

    /// Replaces the record of a live entity, returning the previous one.
    pub fn replace(&mut self, id: EntityId, data: EntityData) -> Result<EntityData> {
        self.validate(id)?;
        if data.entity_type() != id.entity_type() {
            return Err(Error::internal(format!(
                "record of type {} cannot replace {id:?}",
                data.entity_type()
            )));
        }
        self.records
            .insert(id, data)
            .ok_or_else(|| Error::entity_not_found(id))
    }

    /// Removes a live entity, freeing its slot.
    pub fn remove(&mut self, id: EntityId) -> Result<EntityData> {
        self.validate(id)?;
        let data = self
            .records
            .remove(&id)
            .ok_or_else(|| Error::entity_not_found(id))?;

        if let Some(family) = self.families.get_mut(&id.ty) {
            // Was odd (alive), now even (free)
            family.generations[id.index as usize] += 1;
            family.free_list.push_back(id.index);
        }
        Ok(data)
    }

    /// Checks that an id refers to a live entity.
    ///
    /// Distinguishes a never-allocated or freed slot from a slot that was
    /// reused by a newer entity.
    pub fn validate(&self, id: EntityId) -> Result<()> {
        let current = self
            .families
            .get(&id.ty)
            .and_then(|family| family.generations.get(id.index as usize))
            .copied()
            .ok_or_else(|| Error::entity_not_found(id))?;

        if current != id.generation {
            return Err(Error::stale_entity(id));
        }
        if current % 2 == 0 {
            return Err(Error::entity_not_found(id));
        }
        Ok(())
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityData> {
        self.records.get(&id)
    }

    /// Returns the record of a live entity or the reason it is not live.
    pub fn require(&self, id: EntityId) -> Result<&EntityData> {
        self.validate(id)?;
        self.get(id).ok_or_else(|| Error::entity_not_found(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of live entities of one concrete type.
    #[cfg(test)]
    pub fn count_of(&self, ty: EntityTypeId) -> usize {
        self.of_type(ty).count()
    }

    /// Records of one concrete type, in id order.
    pub fn of_type(&self, ty: EntityTypeId) -> impl Iterator<Item = (EntityId, &EntityData)> {
        self.records
            .range(EntityId::type_range(ty))
            .map(|(id, data)| (*id, data))
    }

    /// All records, grouped by type and in id order within a type.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityData)> {
        self.records.iter().map(|(id, data)| (*id, data))
    }

    #[cfg(test)]
    fn generation(&self, ty: EntityTypeId, index: u32) -> Option<u32> {
        self.families
            .get(&ty)
            .and_then(|family| family.generations.get(index as usize))
            .copied()
    }
}
