//! Lookup indices over entity records: symbolic ids and sources.

use arbor_foundation::{EntityId, EntitySource, SymbolicKey};

/// Bidirectional map between symbolic keys and the entities that own them.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SymbolicIdIndex {
    by_key: im::HashMap<SymbolicKey, EntityId>,
    by_id: im::HashMap<EntityId, SymbolicKey>,
}

impl SymbolicIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a key to an entity, replacing any key the entity held before.
    ///
    /// Returns the entity that previously owned the key, if it was another.
    pub fn insert(&mut self, key: SymbolicKey, id: EntityId) -> Option<EntityId> {
        if let Some(previous) = self.by_id.insert(id, key.clone()) {
            if previous != key {
                self.by_key.remove(&previous);
            }
        }
        let displaced = self.by_key.insert(key, id).filter(|&other| other != id);
        if let Some(other) = displaced {
            self.by_id.remove(&other);
        }
        displaced
    }

    /// Unbinds whatever key the entity holds.
    pub fn remove_id(&mut self, id: EntityId) -> Option<SymbolicKey> {
        let key = self.by_id.remove(&id)?;
        self.by_key.remove(&key);
        Some(key)
    }

    pub fn get(&self, key: &SymbolicKey) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    pub fn key_of(&self, id: EntityId) -> Option<&SymbolicKey> {
        self.by_id.get(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}

/// Map from provenance tags to the entities carrying them.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SourceIndex {
    by_source: im::HashMap<EntitySource, im::OrdSet<EntityId>>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &EntitySource, id: EntityId) {
        self.by_source.entry(source.clone()).or_default().insert(id);
    }

    pub fn remove(&mut self, source: &EntitySource, id: EntityId) {
        if let Some(ids) = self.by_source.get_mut(source) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_source.remove(source);
            }
        }
    }

    /// Entities carrying `source`, in id order.
    pub fn get(&self, source: &EntitySource) -> impl Iterator<Item = EntityId> + '_ {
        self.by_source
            .get(source)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub fn sources(&self) -> impl Iterator<Item = &EntitySource> {
        self.by_source.keys()
    }
}
