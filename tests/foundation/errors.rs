//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use arbor_foundation::{EntityId, EntityTypeId, Error, ErrorContext, ErrorKind, FieldType};

fn id() -> EntityId {
    EntityId::new(EntityTypeId::new(2), 42, 1)
}

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_uninitialized_names_the_field() {
    let err = Error::uninitialized("Module", "name");
    assert!(matches!(
        &err.kind,
        ErrorKind::UninitializedField { entity_type, field } if entity_type == "Module" && field == "name"
    ));
    assert!(err.to_string().contains("name"));
}

#[test]
fn error_lifecycle_kinds() {
    assert!(matches!(
        Error::already_bound("Module").kind,
        ErrorKind::AlreadyBound { .. }
    ));
    let err = Error::modification_not_allowed("Module", "committed");
    assert!(matches!(err.kind, ErrorKind::ModificationNotAllowed { .. }));
    assert!(err.to_string().contains("committed"));
}

#[test]
fn error_entity_lookups() {
    assert!(matches!(
        Error::entity_not_found(id()).kind,
        ErrorKind::EntityNotFound(e) if e == id()
    ));
    assert!(matches!(
        Error::stale_entity(id()).kind,
        ErrorKind::StaleEntity(_)
    ));
    assert!(matches!(
        Error::dangling_relation("Module -> ContentRoot", id()).kind,
        ErrorKind::DanglingRelation { .. }
    ));
}

#[test]
fn error_type_mismatch_display() {
    let err = Error::type_mismatch("dependencies", FieldType::list(FieldType::String), "int");
    let msg = err.to_string();
    assert!(msg.contains("dependencies"));
    assert!(msg.contains("int"));
}

#[test]
fn error_schema_kinds() {
    assert!(matches!(Error::unknown_type("Ghost").kind, ErrorKind::UnknownType(_)));
    assert!(matches!(
        Error::unknown_field("Module", "nmae").kind,
        ErrorKind::UnknownField { .. }
    ));
    assert!(matches!(
        Error::relation_mismatch("Module -> Module", "cycle").kind,
        ErrorKind::RelationMismatch { .. }
    ));
    assert!(matches!(
        Error::duplicate_key("t0[core]").kind,
        ErrorKind::DuplicateSymbolicKey(_)
    ));
    assert!(matches!(
        Error::schema_conflict("twice").kind,
        ErrorKind::SchemaConflict(_)
    ));
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn error_context_collects_frames() {
    let err = Error::internal("boom")
        .with_context(ErrorContext::new().with_entity(id()))
        .in_operation("set_children")
        .in_operation("attach");

    let context = err.context.unwrap();
    assert_eq!(context.entity, Some(id()));
    assert_eq!(context.stack, vec!["set_children", "attach"]);
}

#[test]
fn in_operation_creates_context() {
    let err = Error::internal("boom").in_operation("commit");
    assert!(err.context.is_some());
}
