//! Schema-driven entity storage, relations, and snapshots for Arbor.
//!
//! This crate provides:
//! - [`Schema`] - Entity shapes, variant types, and relation descriptors
//! - [`Snapshot`] - Immutable, versioned store state with structural sharing
//! - [`Builder`] - Mutable session that commits to a new snapshot
//! - [`EntityHandle`] - Detached entities with buffered fields and edges
//! - [`StorageView`] / [`EntityView`] - Read access shared by both
//! - [`StoreConfig`] - Commit checks and key-conflict policy

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod builder;
mod changes;
mod config;
mod consistency;
mod entity;
mod handle;
mod index;
mod record;
mod registry;
mod relation;
mod schema;
mod snapshot;
mod soft_link;
mod view;

pub use builder::{Builder, EntityRef, Modifier};
pub use changes::EntityChange;
pub use config::{OnKeyConflict, StoreConfig};
pub use handle::{EntityHandle, EntityState};
pub use record::{EntityData, IgnoringSource};
pub use registry::{DescriptorId, RelationDescriptor, RelationKind};
pub use relation::{Edge, EdgeDelta};
pub use schema::{Alternative, EntityShape, FieldSchema, Schema, SchemaBuilder, ShapeDef, VariantSchema};
pub use snapshot::Snapshot;
pub use view::{EntityStorage, EntityView, StorageView};
