//! Immutable store snapshots.

use std::fmt;
use std::sync::Arc;

use arbor_foundation::Result;

use crate::builder::Builder;
use crate::config::StoreConfig;
use crate::consistency;
use crate::schema::Schema;
use crate::view::{EntityStorage, Indexes, StorageView};

/// An immutable, versioned state of the store.
///
/// Cloning is O(1) and shares everything. Snapshots are `Send + Sync` and
/// can be read from any number of threads without synchronization; edits go
/// through a [`Builder`], which commits to a new snapshot and leaves this one
/// untouched.
#[derive(Clone)]
pub struct Snapshot {
    schema: Arc<Schema>,
    config: StoreConfig,
    state: Arc<Indexes>,
    version: u64,
}

impl Snapshot {
    /// Creates an empty snapshot with the default configuration.
    #[must_use]
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            config: StoreConfig::default(),
            state: Arc::new(Indexes::default()),
            version: 0,
        }
    }

    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        config: StoreConfig,
        state: Indexes,
        version: u64,
    ) -> Self {
        Self {
            schema,
            config,
            state: Arc::new(state),
            version,
        }
    }

    /// Returns this snapshot with another configuration.
    ///
    /// Builders made from the result inherit the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the version: 0 for an empty snapshot, +1 per commit.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Starts a builder on top of this snapshot.
    #[must_use]
    pub fn builder(&self) -> Builder {
        Builder::new(self.clone())
    }

    pub(crate) fn state(&self) -> &Indexes {
        &self.state
    }

    /// Checks every record, edge and index against the schema.
    ///
    /// # Errors
    ///
    /// Returns `DanglingRelation` if an edge points at a missing entity,
    /// `RelationMismatch` if an edge violates its descriptor,
    /// `UninitializedField` if a required field or mandatory parent is
    /// missing, and `Internal` if an index disagrees with the records.
    pub fn assert_consistency(&self) -> Result<()> {
        consistency::check(&self.schema, &self.state)
    }
}

impl EntityStorage for Snapshot {
    fn view(&self) -> StorageView<'_> {
        StorageView::new(&self.schema, &self.state)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("entities", &self.state.entities.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
