//! Soft-link scenarios
//!
//! Reverse lookup and rename propagation through direct, nested, and
//! keyed links.

use arbor_foundation::{ErrorKind, Value};
use arbor_storage::{EntityStorage, OnKeyConflict, StoreConfig};

use crate::fixture::Model;

#[test]
fn rename_propagates_through_every_link_shape() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let core = model.add_module(&mut b, "core");
    let app = model.add_module(&mut b, "app");
    let tests = model.add_module(&mut b, "tests");
    model.add_library(&mut b, "guava");

    b.modify(app, |m| {
        m.set(
            "dependencies",
            Value::list([model.module_dep("core"), model.library_dep("guava", "compile")]),
        )?;
        m.set(
            "aliases",
            Value::map([(Value::from("base"), Value::from(model.key(model.module, "core")))]),
        )
    })
    .unwrap();
    b.set_field(tests, "test_of", Value::from(model.key(model.module, "core")))
        .unwrap();
    let snapshot = b.commit().unwrap();

    let old = model.key(model.module, "core");
    let new = model.key(model.module, "kernel");
    assert_eq!(snapshot.referrers(&old), vec![app, tests]);

    let mut b = snapshot.builder();
    b.set_field(core, "name", "kernel").unwrap();
    let renamed = b.commit().unwrap();

    assert!(renamed.referrers(&old).is_empty());
    assert_eq!(renamed.referrers(&new), vec![app, tests]);
    assert_eq!(renamed.resolve(&new), Some(core));
    assert_eq!(renamed.resolve(&old), None);

    let app_view = renamed.entity(app).unwrap();
    assert_eq!(
        app_view.get("dependencies").unwrap(),
        &Value::list([model.module_dep("kernel"), model.library_dep("guava", "compile")])
    );
    assert_eq!(
        app_view.get("aliases").unwrap(),
        &Value::map([(Value::from("base"), Value::from(new.clone()))])
    );
    assert_eq!(
        renamed.entity(tests).unwrap().get("test_of").unwrap(),
        &Value::from(new)
    );

    // The base snapshot still sees the old names
    assert_eq!(snapshot.referrers(&old), vec![app, tests]);
    assert!(renamed.assert_consistency().is_ok());
}

#[test]
fn explicit_rename_of_a_dangling_key() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    b.set_field(
        app,
        "dependencies",
        Value::list([model.library_dep("junit", "test"), model.library_dep("junit", "compile")]),
    )
    .unwrap();

    let junit = model.key(model.library, "junit");
    let junit5 = model.key(model.library, "junit5");
    assert!(b.resolve(&junit).is_none());
    assert_eq!(b.referrers(&junit), vec![app]);

    assert!(b.rename(&junit, &junit5).unwrap());
    assert_eq!(b.referrers(&junit5), vec![app]);
    assert_eq!(
        b.entity(app).unwrap().links().len(),
        1,
        "both occurrences now name the same key"
    );
}

#[test]
fn links_are_reported_as_a_set() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    b.set_field(
        app,
        "dependencies",
        Value::list([
            model.module_dep("core"),
            model.module_dep("core"),
            model.library_dep("guava", "compile"),
            Value::variant("Sdk", [Value::from("17")]),
        ]),
    )
    .unwrap();

    let links = b.view().links_of(app).unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.contains(&model.key(model.module, "core")));
    assert!(links.contains(&model.key(model.library, "guava")));

    // Dropping one of two duplicate occurrences keeps the link
    b.set_field(
        app,
        "dependencies",
        Value::list([model.module_dep("core")]),
    )
    .unwrap();
    assert_eq!(b.referrers(&model.key(model.module, "core")), vec![app]);
    assert!(b.referrers(&model.key(model.library, "guava")).is_empty());
}

#[test]
fn key_conflicts_follow_the_configured_policy() {
    let model = Model::new();

    let mut b = model.empty().builder();
    let first = model.add_module(&mut b, "core");
    let second = model.add_module(&mut b, "core");
    assert!(!b.contains(first));
    assert_eq!(b.resolve(&model.key(model.module, "core")), Some(second));

    let strict = model
        .empty()
        .with_config(StoreConfig::default().with_on_key_conflict(OnKeyConflict::Error));
    let mut b = strict.builder();
    let core = model.add_module(&mut b, "core");
    let util = model.add_module(&mut b, "util");
    let err = b.set_field(util, "name", "core").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateSymbolicKey(_)));
    assert_eq!(b.resolve(&model.key(model.module, "util")), Some(util));
    assert_eq!(b.resolve(&model.key(model.module, "core")), Some(core));
}
