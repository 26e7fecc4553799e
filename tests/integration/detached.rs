//! Detached-entity scenarios
//!
//! Wiring entities before they are stored, attaching them, and handing
//! them between builders.

use std::sync::Arc;

use arbor_foundation::{ErrorKind, Value};
use arbor_storage::{EntityHandle, EntityState, EntityStorage};

use crate::fixture::Model;

#[test]
fn parent_with_three_children_wired_before_attach() {
    let model = Model::new();
    let parent = EntityHandle::create(
        &model.schema,
        model.module,
        "gradle",
        &[("name", Value::from("core"))],
        &[],
    )
    .unwrap();
    let children: Vec<EntityHandle> = (1..=3)
        .map(|i| {
            EntityHandle::create(
                &model.schema,
                model.content_root,
                "gradle",
                &[("url", Value::from(format!("file:///core/{i}")))],
                &[&parent],
            )
            .unwrap()
        })
        .collect();
    assert_eq!(parent.pending_children(model.roots), children);
    for child in &children {
        assert!(child.validate().is_ok());
    }

    let mut b = model.empty().builder();
    let parent_id = parent.attach_to(&mut b).unwrap();
    let child_ids: Vec<_> = children.iter().map(|c| c.id().unwrap()).collect();

    assert_eq!(b.children(model.roots, parent_id), child_ids);
    for &child in &child_ids {
        assert_eq!(b.parent(model.roots, child), Some(parent_id));
    }
    assert!(children.iter().all(|c| c.state() == EntityState::Attached));

    let snapshot = b.commit().unwrap();
    assert_eq!(parent.state(), EntityState::Committed);
    assert_eq!(snapshot.entity_count(), 4);
    assert!(snapshot.assert_consistency().is_ok());
}

#[test]
fn detached_parent_takes_three_children_in_one_call() {
    let model = Model::new();
    let parent = EntityHandle::create(
        &model.schema,
        model.module,
        "gradle",
        &[("name", Value::from("core"))],
        &[],
    )
    .unwrap();
    let children: Vec<EntityHandle> = (1..=3)
        .map(|i| {
            EntityHandle::create(
                &model.schema,
                model.content_root,
                "gradle",
                &[("url", Value::from(format!("file:///core/{i}")))],
                &[],
            )
            .unwrap()
        })
        .collect();

    // Mandatory parent still missing
    for child in &children {
        let err = child.validate().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UninitializedField { .. }));
    }

    let refs: Vec<&EntityHandle> = children.iter().collect();
    parent.set_children(model.roots, &refs).unwrap();
    assert_eq!(parent.pending_children(model.roots), children);
    for child in &children {
        assert!(child.validate().is_ok());
        assert_eq!(child.pending_parent(model.roots).as_ref(), Some(&parent));
    }

    let base = model.empty();
    let mut b = base.builder();
    let parent_id = parent.attach_to(&mut b).unwrap();
    let child_ids: Vec<_> = children.iter().map(|c| c.id().unwrap()).collect();
    assert_eq!(b.children(model.roots, parent_id), child_ids);
    for &child in &child_ids {
        assert_eq!(b.parent(model.roots, child), Some(parent_id));
    }

    let mut other = base.builder();
    let err = children[0].attach_to(&mut other).unwrap_err();
    match err.kind {
        ErrorKind::AlreadyBound { entity_type } => assert_eq!(entity_type, "ContentRoot"),
        kind => panic!("unexpected error: {kind:?}"),
    }
    assert_eq!(other.entity_count(), 0);

    let snapshot = b.commit().unwrap();
    assert_eq!(snapshot.entity_count(), 4);
    assert_eq!(snapshot.children(model.roots, parent_id), child_ids);
    assert!(snapshot.assert_consistency().is_ok());
}

#[test]
fn detached_fields_round_trip_into_a_fresh_builder() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    b.set_field(app, "dependencies", Value::list([model.module_dep("core")]))
        .unwrap();
    let snapshot = b.commit().unwrap();
    let original = snapshot.entity(app).unwrap().data().clone();

    let copy = EntityHandle::from_record(&model.schema, &original).unwrap();
    copy.set_source("imported").unwrap();
    let mut fresh = model.empty().builder();
    let id = fresh.attach(&copy).unwrap();

    let stored = fresh.entity(id).unwrap().data().clone();
    assert!(stored.eq_ignoring_source(&original));
    assert_eq!(stored.ignoring_source(), original.ignoring_source());
    assert_ne!(stored, original);
    assert_eq!(fresh.referrers(&model.key(model.module, "core")), vec![id]);
}

#[test]
fn handles_move_between_threads_before_attaching() {
    let model = Model::new();
    let handle = EntityHandle::new(&model.schema, model.module, "test").unwrap();
    handle.set("name", "core").unwrap();

    let schema = Arc::clone(&model.schema);
    let snapshot = model.empty();
    let id = std::thread::spawn(move || {
        assert!(Arc::ptr_eq(handle.schema(), &schema));
        let mut b = snapshot.builder();
        let id = handle.attach_to(&mut b).unwrap();
        b.commit().unwrap().entity(id).map(|e| e.id()).unwrap()
    })
    .join()
    .unwrap();
    assert_eq!(id.entity_type(), model.module);
}

#[test]
fn attached_handles_are_edited_through_their_builder() {
    let model = Model::new();
    let handle = EntityHandle::create(
        &model.schema,
        model.module,
        "test",
        &[("name", Value::from("core"))],
        &[],
    )
    .unwrap();

    let base = model.empty();
    let mut first = base.builder();
    let mut second = base.builder();
    handle.attach_to(&mut first).unwrap();

    let err = handle.attach_to(&mut second).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AlreadyBound { .. }));
    let err = second.set_field(&handle, "name", "x").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModificationNotAllowed { .. }));
    let err = handle.set("name", "x").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModificationNotAllowed { .. }));

    first.set_field(&handle, "name", "kernel").unwrap();
    first.commit().unwrap();
    let err = first.set_field(&handle, "name", "again").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModificationNotAllowed { .. }));
}

#[test]
fn detached_children_may_join_a_stored_parent() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let module = EntityHandle::create(
        &model.schema,
        model.module,
        "test",
        &[("name", Value::from("core"))],
        &[],
    )
    .unwrap();
    let module_id = b.attach(&module).unwrap();

    let root = EntityHandle::create(
        &model.schema,
        model.content_root,
        "test",
        &[("url", Value::from("file:///core"))],
        &[&module],
    )
    .unwrap();
    let root_id = root.attach_to(&mut b).unwrap();
    assert_eq!(b.children(model.roots, module_id), vec![root_id]);
    assert!(b.commit().is_ok());
}
