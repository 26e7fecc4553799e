//! Integration tests for schema declaration
//!
//! Tests type hierarchies, variant types, and relation descriptors.

use arbor_foundation::{ErrorKind, FieldType, SymbolicKey, Value};
use arbor_storage::{Alternative, FieldSchema, RelationDescriptor, RelationKind, Schema, ShapeDef};

// =============================================================================
// Types and Shapes
// =============================================================================

#[test]
fn type_hierarchy() {
    let mut b = Schema::builder();
    let facet = b.abstract_type("Facet", &[]).unwrap();
    let jvm = b.abstract_type("JvmFacet", &[facet]).unwrap();
    let java = b.entity("JavaFacet", &[jvm], ShapeDef::new()).unwrap();
    let python = b.entity("PythonFacet", &[facet], ShapeDef::new()).unwrap();
    let schema = b.build().unwrap();

    assert!(schema.is_a(java, facet));
    assert!(schema.is_a(java, jvm));
    assert!(!schema.is_a(python, jvm));
    assert!(schema.is_abstract(jvm));
    assert!(!schema.is_abstract(java));

    let mut kinds = schema.concrete_kinds(facet).to_vec();
    kinds.sort();
    assert_eq!(kinds, vec![java, python]);
    assert_eq!(schema.type_id("JavaFacet").unwrap(), java);
    assert_eq!(schema.type_name(python), "PythonFacet");
}

#[test]
fn duplicate_type_names_conflict() {
    let mut b = Schema::builder();
    b.entity_type("Module", &[]).unwrap();
    let err = b.entity_type("Module", &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SchemaConflict(_)));
}

#[test]
fn unknown_type_lookup() {
    let schema = Schema::builder().build().unwrap();
    let err = schema.type_id("Module").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownType(_)));
}

#[test]
fn shapes_fill_defaults_and_report_missing_fields() {
    let mut b = Schema::builder();
    let module = b
        .entity(
            "Module",
            &[],
            ShapeDef::new()
                .with_field(FieldSchema::required("name", FieldType::String))
                .with_field(FieldSchema::optional("exported", FieldType::Bool, Value::from(false)))
                .with_field(FieldSchema::optional_nil("group", FieldType::option(FieldType::String)))
                .with_key(&["name"]),
        )
        .unwrap();
    let schema = b.build().unwrap();
    let shape = schema.shape(module).unwrap();

    assert_eq!(shape.name(), "Module");
    assert_eq!(shape.field_index("exported"), Some(1));
    assert!(shape.has_key());
    assert!(!shape.carries_links());

    let initial = shape.initial_fields();
    assert_eq!(initial, vec![Value::Nil, Value::from(false), Value::Nil]);
    assert_eq!(shape.first_missing(|i| initial.get(i)), Some("name"));
    assert_eq!(shape.symbolic_key(|i| initial.get(i)), None);

    let named = vec![Value::from("core"), Value::from(true), Value::Nil];
    assert_eq!(shape.first_missing(|i| named.get(i)), None);
    assert_eq!(
        shape.symbolic_key(|i| named.get(i)),
        Some(SymbolicKey::named(module, "core"))
    );
}

// =============================================================================
// Variant Types
// =============================================================================

#[test]
fn recursive_variants_check_nested_values() {
    let mut b = Schema::builder();
    let module = b.entity_type("Module", &[]).unwrap();
    let scope = b.declare_variant("Scope").unwrap();
    b.define_variant(
        scope,
        vec![
            Alternative::new("Leaf", vec![FieldType::link(module)]),
            Alternative::new("Nested", vec![FieldType::list(FieldType::Variant(scope))]),
        ],
    )
    .unwrap();
    let schema = b.build().unwrap();

    let leaf = Value::variant("Leaf", [Value::from(SymbolicKey::named(module, "core"))]);
    let tree = Value::variant("Nested", [Value::list([leaf.clone(), leaf])]);
    let ty = FieldType::Variant(scope);
    assert!(schema.check_value("scope", &ty, &tree).is_ok());
    assert!(schema.carries_links(&ty));

    let bad = Value::variant("Nested", [Value::list([Value::from(3)])]);
    let err = schema.check_value("scope", &ty, &bad).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));

    let unknown_tag = Value::variant("Missing", []);
    assert!(schema.check_value("scope", &ty, &unknown_tag).is_err());
    let wrong_arity = Value::variant("Leaf", []);
    assert!(schema.check_value("scope", &ty, &wrong_arity).is_err());
}

#[test]
fn links_must_point_at_a_compatible_type() {
    let mut b = Schema::builder();
    let facet = b.abstract_type("Facet", &[]).unwrap();
    let java = b.entity("JavaFacet", &[facet], ShapeDef::new()).unwrap();
    let module = b.entity_type("Module", &[]).unwrap();
    let schema = b.build().unwrap();

    let to_facet = FieldType::link(facet);
    let java_key = Value::from(SymbolicKey::named(java, "java"));
    let module_key = Value::from(SymbolicKey::named(module, "core"));
    assert!(schema.check_value("facet", &to_facet, &java_key).is_ok());
    assert!(schema.check_value("facet", &to_facet, &module_key).is_err());
    assert!(
        schema
            .check_value("facet", &FieldType::option(to_facet), &Value::Nil)
            .is_ok()
    );
}

// =============================================================================
// Relation Descriptors
// =============================================================================

#[test]
fn relations_are_interned_structurally() {
    let mut b = Schema::builder();
    let module = b.entity_type("Module", &[]).unwrap();
    let root = b.entity_type("ContentRoot", &[]).unwrap();
    let first = b
        .relation(RelationDescriptor::one_to_many(module, root))
        .unwrap();
    let again = b
        .relation(RelationDescriptor::one_to_many(module, root))
        .unwrap();
    let optional = b
        .relation(RelationDescriptor::one_to_many(module, root).optional())
        .unwrap();
    let schema = b.build().unwrap();

    assert_eq!(first, again);
    assert_ne!(first, optional);
    assert_eq!(schema.descriptors().count(), 2);
    assert_eq!(
        schema.descriptor_id(&RelationDescriptor::one_to_many(module, root)).unwrap(),
        first
    );
    assert_eq!(schema.describe(first), "Module -> ContentRoot (one-to-many)");
    assert_eq!(
        schema.describe(optional),
        "Module -> ContentRoot (one-to-many, optional)"
    );
    assert_eq!(schema.parent_relations(module), &[first, optional]);
    assert_eq!(schema.child_relations(root), &[first, optional]);
}

#[test]
fn abstract_relations_reach_every_subtype() {
    let mut b = Schema::builder();
    let module = b.entity_type("Module", &[]).unwrap();
    let facet = b.abstract_type("Facet", &[]).unwrap();
    let java = b.entity("JavaFacet", &[facet], ShapeDef::new()).unwrap();
    let facets = b
        .relation(RelationDescriptor::abstract_one_to_many(module, facet).optional())
        .unwrap();
    let schema = b.build().unwrap();

    let descriptor = schema.descriptor(facets).unwrap();
    assert_eq!(descriptor.kind, RelationKind::AbstractOneToMany);
    assert!(descriptor.kind.is_abstract());
    assert!(!descriptor.is_mandatory());
    assert!(schema.accepts_child(descriptor, java));
    assert!(!schema.accepts_child(descriptor, module));
    assert!(schema.child_relations(java).contains(&facets));
}
