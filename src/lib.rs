//! Arbor - In-memory entity-relationship store
//!
//! This crate re-exports all layers of the Arbor system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: arbor_storage    - Schema, relations, soft links, snapshots, builders
//! Layer 0: arbor_foundation - Core types (Value, EntityId, SymbolicKey, Error)
//! ```

pub use arbor_foundation as foundation;
pub use arbor_storage as storage;
