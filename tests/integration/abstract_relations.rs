//! Abstract relation scenarios
//!
//! One descriptor accepting every concrete subtype of an abstract type.

use arbor_foundation::{ErrorKind, Value};
use arbor_storage::EntityStorage;

use crate::fixture::Model;

#[test]
fn abstract_children_mix_concrete_types() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let java = b
        .add(model.java_facet, "test", &[("name", Value::from("Java"))])
        .unwrap();
    let kotlin = b
        .add(model.kotlin_facet, "test", &[("name", Value::from("Kotlin"))])
        .unwrap();

    b.set_children(model.facets, app, &[kotlin, java]).unwrap();
    let snapshot = b.commit().unwrap();

    assert_eq!(snapshot.children(model.facets, app), vec![kotlin, java]);
    assert_eq!(snapshot.parent(model.facets, java), Some(app));

    let mut kinds: Vec<_> = snapshot
        .view()
        .entities_of_kind(model.facet)
        .map(|e| e.type_name().to_string())
        .collect();
    kinds.sort();
    assert_eq!(kinds, vec!["JavaFacet", "KotlinFacet"]);
    assert_eq!(snapshot.view().entities(model.java_facet).count(), 1);
    assert_eq!(snapshot.view().entities(model.module).count(), 1);
}

#[test]
fn abstract_relations_reject_foreign_types() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let root = model.add_root(&mut b, "file:///app");

    let err = b.add_child(model.facets, app, root).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RelationMismatch { .. }));
    assert!(b.children(model.facets, app).is_empty());
}

#[test]
fn abstract_types_cannot_be_instantiated() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let err = b
        .add(model.facet, "test", &[("name", Value::from("Facet"))])
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SchemaConflict(_)));
    assert_eq!(b.entity_count(), 0);
}

#[test]
fn optional_abstract_children_can_be_dropped() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let java = b
        .add(model.java_facet, "test", &[("name", Value::from("Java"))])
        .unwrap();
    b.add_child(model.facets, app, java).unwrap();
    b.set_children(model.facets, app, &[]).unwrap();

    assert_eq!(b.parent(model.facets, java), None);
    // The relation is optional, so an orphaned facet still commits
    let snapshot = b.commit().unwrap();
    assert!(snapshot.contains(java));
}

#[test]
fn removing_the_parent_cascades_into_every_subtype() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let java = b
        .add(model.java_facet, "test", &[("name", Value::from("Java"))])
        .unwrap();
    let kotlin = b
        .add(model.kotlin_facet, "test", &[("name", Value::from("Kotlin"))])
        .unwrap();
    b.set_children(model.facets, app, &[java, kotlin]).unwrap();

    let removed = b.remove(app).unwrap();
    assert_eq!(removed[0], app);
    assert_eq!(removed.len(), 3);
    assert_eq!(b.view().entities_of_kind(model.facet).count(), 0);
}
