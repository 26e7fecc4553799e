//! Per-entity change tracking for builders.
//!
//! The log keeps one merged entry per entity, always relative to the base
//! snapshot: an entity added and then edited is still "added", an entity
//! edited and then removed is "removed" with its base record.

use arbor_foundation::EntityId;

use crate::record::EntityData;

/// One entity's difference between a builder and its base snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityChange {
    /// The entity does not exist in the base.
    Added {
        /// New entity id.
        id: EntityId,
        /// Current record.
        data: EntityData,
    },
    /// The entity exists only in the base.
    Removed {
        /// Removed entity id.
        id: EntityId,
        /// Record as it was in the base.
        data: EntityData,
    },
    /// The entity exists in both; its record or relations changed.
    ///
    /// `old` equals `new` when only relations changed.
    Replaced {
        /// Entity id.
        id: EntityId,
        /// Record in the base.
        old: EntityData,
        /// Current record.
        new: EntityData,
    },
}

impl EntityChange {
    /// Returns the entity the change is about.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Added { id, .. } | Self::Removed { id, .. } | Self::Replaced { id, .. } => *id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChangeEntry {
    Added(EntityData),
    Replaced { old: EntityData, new: EntityData },
    Removed(EntityData),
}

/// Merged change entries keyed by entity.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChangeLog {
    entries: im::OrdMap<EntityId, ChangeEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(&mut self, id: EntityId, data: EntityData) {
        if self.entries.insert(id, ChangeEntry::Added(data)).is_some() {
            tracing::warn!(entity = ?id, "entity id added twice in one builder");
        }
    }

    /// Records a new record for an entity.
    pub fn replaced(&mut self, id: EntityId, old: &EntityData, new: EntityData) {
        let entry = match self.entries.remove(&id) {
            None => ChangeEntry::Replaced {
                old: old.clone(),
                new,
            },
            Some(ChangeEntry::Added(_)) => ChangeEntry::Added(new),
            Some(ChangeEntry::Replaced { old, .. }) => ChangeEntry::Replaced { old, new },
            Some(removed @ ChangeEntry::Removed(_)) => {
                tracing::warn!(entity = ?id, "ignoring edit of a removed entity");
                removed
            }
        };
        self.entries.insert(id, entry);
    }

    /// Records that only the relations of an entity changed.
    pub fn relinked(&mut self, id: EntityId, current: &EntityData) {
        match self.entries.get(&id) {
            None => {
                self.entries.insert(
                    id,
                    ChangeEntry::Replaced {
                        old: current.clone(),
                        new: current.clone(),
                    },
                );
            }
            Some(ChangeEntry::Removed(_)) => {
                tracing::warn!(entity = ?id, "ignoring relink of a removed entity");
            }
            Some(_) => {}
        }
    }

    pub fn removed(&mut self, id: EntityId, current: &EntityData) {
        match self.entries.remove(&id) {
            None => {
                self.entries.insert(id, ChangeEntry::Removed(current.clone()));
            }
            Some(ChangeEntry::Added(_)) => {}
            Some(ChangeEntry::Replaced { old, .. }) => {
                self.entries.insert(id, ChangeEntry::Removed(old));
            }
            Some(removed @ ChangeEntry::Removed(_)) => {
                tracing::warn!(entity = ?id, "entity removed twice");
                self.entries.insert(id, removed);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &ChangeEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Changed entities that still exist, in id order.
    #[cfg(test)]
    pub fn live_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.iter()
            .filter(|(_, entry)| !matches!(entry, ChangeEntry::Removed(_)))
            .map(|(id, _)| id)
    }

    pub fn to_changes(&self) -> Vec<EntityChange> {
        self.iter()
            .map(|(id, entry)| match entry {
                ChangeEntry::Added(data) => EntityChange::Added {
                    id,
                    data: data.clone(),
                },
                ChangeEntry::Replaced { old, new } => EntityChange::Replaced {
                    id,
                    old: old.clone(),
                    new: new.clone(),
                },
                ChangeEntry::Removed(data) => EntityChange::Removed {
                    id,
                    data: data.clone(),
                },
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries = im::OrdMap::new();
    }
}
