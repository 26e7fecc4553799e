//! Provenance tags for entities.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque provenance tag attached to every entity.
///
/// The store never interprets a source beyond equality. It records which
/// synchronization input produced an entity, so two entities that differ only
/// by source can be recognized as the same logical entity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntitySource(Arc<str>);

impl EntitySource {
    /// Creates a source tag.
    #[must_use]
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntitySource({:?})", self.0)
    }
}

impl fmt::Display for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntitySource {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for EntitySource {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}
