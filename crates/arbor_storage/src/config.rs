//! Configuration for snapshots and builders.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What happens when an entity takes a symbolic key another entity holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OnKeyConflict {
    /// Remove the existing holder (and its children) and log a warning.
    #[default]
    Replace,
    /// Reject the edit with `DuplicateSymbolicKey`.
    Error,
}

/// Store behaviour switches.
///
/// Carried by every snapshot and inherited by the builders made from it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoreConfig {
    /// Run the full consistency checker on every commit.
    pub consistency_checks: bool,

    /// Policy for symbolic-key collisions.
    pub on_key_conflict: OnKeyConflict,

    /// Rewrite referrers when an entity's own symbolic key changes.
    pub propagate_renames: bool,

    /// Removing a parent also removes its children.
    pub cascade_removal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            consistency_checks: false,
            on_key_conflict: OnKeyConflict::Replace,
            propagate_renames: true,
            cascade_removal: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration that checks consistency on every commit and
    /// rejects key collisions.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            consistency_checks: true,
            on_key_conflict: OnKeyConflict::Error,
            ..Self::default()
        }
    }

    /// Builder method to enable/disable commit-time consistency checks.
    #[must_use]
    pub fn with_consistency_checks(mut self, enabled: bool) -> Self {
        self.consistency_checks = enabled;
        self
    }

    /// Builder method to set the key-conflict policy.
    #[must_use]
    pub fn with_on_key_conflict(mut self, policy: OnKeyConflict) -> Self {
        self.on_key_conflict = policy;
        self
    }

    /// Builder method to enable/disable rename propagation.
    #[must_use]
    pub fn with_propagate_renames(mut self, enabled: bool) -> Self {
        self.propagate_renames = enabled;
        self
    }

    /// Builder method to enable/disable cascading removal.
    #[must_use]
    pub fn with_cascade_removal(mut self, enabled: bool) -> Self {
        self.cascade_removal = enabled;
        self
    }
}
