//! Core identifiers, values, and persistent collections for Arbor.
//!
//! This crate provides:
//! - [`EntityId`] / [`EntityTypeId`] - Typed generational entity identifiers
//! - [`Value`] - Field values, including soft links and tagged variants
//! - [`SymbolicKey`] - Stable, type-qualified names used by soft links
//! - [`EntitySource`] - Opaque provenance tags
//! - [`FieldType`] - Declared field types used by schemas
//! - [`Error`] - Error taxonomy with context
//! - Persistent collections ([`ArVec`], [`ArSet`], [`ArMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collections;
mod entity;
mod error;
mod key;
mod source;
mod types;
mod value;

pub use collections::{ArMap, ArSet, ArVec};
pub use entity::{EntityId, EntityTypeId};
pub use error::{Error, ErrorContext, ErrorKind};
pub use key::SymbolicKey;
pub use source::EntitySource;
pub use types::{FieldType, VariantTypeId};
pub use value::{Value, Variant};

/// Result alias used throughout Arbor.
pub type Result<T> = std::result::Result<T, Error>;
