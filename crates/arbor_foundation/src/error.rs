//! Error types for Arbor.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every error is fail-fast: retrying the same call against the same state
//! fails the same way.

use std::fmt;

use thiserror::Error;

use crate::entity::EntityId;
use crate::types::FieldType;

/// The main error type for Arbor operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Pushes a frame onto this error's context, creating one if needed.
    #[must_use]
    pub fn in_operation(mut self, operation: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_frame(operation));
        self
    }

    /// Creates an uninitialized field error.
    #[must_use]
    pub fn uninitialized(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::UninitializedField {
            entity_type: entity_type.into(),
            field: field.into(),
        })
    }

    /// Creates an already-bound error.
    #[must_use]
    pub fn already_bound(entity_type: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyBound {
            entity_type: entity_type.into(),
        })
    }

    /// Creates a modification-not-allowed error.
    #[must_use]
    pub fn modification_not_allowed(
        entity_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::ModificationNotAllowed {
            entity_type: entity_type.into(),
            reason: reason.into(),
        })
    }

    /// Creates a dangling relation error.
    #[must_use]
    pub fn dangling_relation(relation: impl Into<String>, entity: EntityId) -> Self {
        Self::new(ErrorKind::DanglingRelation {
            relation: relation.into(),
            entity,
        })
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(id))
    }

    /// Creates a stale entity reference error.
    #[must_use]
    pub fn stale_entity(id: EntityId) -> Self {
        Self::new(ErrorKind::StaleEntity(id))
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(field: impl Into<String>, expected: FieldType, actual: &str) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            field: field.into(),
            expected,
            actual: actual.to_string(),
        })
    }

    /// Creates an unknown entity type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownType(name.into()))
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField {
            entity_type: entity_type.into(),
            field: field.into(),
        })
    }

    /// Creates an unknown relation error.
    #[must_use]
    pub fn unknown_relation(relation: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownRelation(relation.into()))
    }

    /// Creates a relation mismatch error.
    #[must_use]
    pub fn relation_mismatch(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::RelationMismatch {
            relation: relation.into(),
            reason: reason.into(),
        })
    }

    /// Creates a duplicate symbolic key error.
    #[must_use]
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateSymbolicKey(key.into()))
    }

    /// Creates a schema conflict error.
    #[must_use]
    pub fn schema_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaConflict(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A required field or mandatory relation is missing.
    #[error("uninitialized field: {field} on {entity_type}")]
    UninitializedField {
        /// Name of the entity type.
        entity_type: String,
        /// The first missing field or relation.
        field: String,
    },

    /// The entity is attached to, or committed by, a different builder.
    #[error("{entity_type} is already bound to another builder")]
    AlreadyBound {
        /// Name of the entity type.
        entity_type: String,
    },

    /// The entity cannot be edited in its current lifecycle state.
    #[error("modification not allowed on {entity_type}: {reason}")]
    ModificationNotAllowed {
        /// Name of the entity type.
        entity_type: String,
        /// Why the edit was rejected.
        reason: String,
    },

    /// A relation edge points at a missing entity.
    #[error("dangling relation {relation} at {entity:?}")]
    DanglingRelation {
        /// Description of the relation.
        relation: String,
        /// The entity at the missing end, or the one holding the edge.
        entity: EntityId,
    },

    /// Entity was not found in storage.
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),

    /// Entity reference is stale (generation mismatch).
    #[error("stale entity reference: {0:?}")]
    StaleEntity(EntityId),

    /// Field value does not conform to the declared type.
    #[error("type mismatch in {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field path where the mismatch occurred.
        field: String,
        /// The declared type.
        expected: FieldType,
        /// The kind of value encountered.
        actual: String,
    },

    /// Entity type is not declared in the schema.
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// Field is not declared on the entity type.
    #[error("unknown field: {field} on {entity_type}")]
    UnknownField {
        /// Name of the entity type.
        entity_type: String,
        /// The field name that was not found.
        field: String,
    },

    /// Relation descriptor is not registered in the schema.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// Relation descriptor does not apply to the entities or the call.
    #[error("relation mismatch on {relation}: {reason}")]
    RelationMismatch {
        /// Description of the relation.
        relation: String,
        /// Why the relation does not apply.
        reason: String,
    },

    /// Another entity already holds this symbolic key.
    #[error("duplicate symbolic key: {0}")]
    DuplicateSymbolicKey(String),

    /// Schema definition is inconsistent, or two schemas were mixed.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Entity the failing operation targeted.
    pub entity: Option<EntityId>,
    /// Chain of operations, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(entity) = &self.entity {
            write!(f, "at {entity}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
