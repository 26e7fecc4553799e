//! Snapshot and change-log scenarios

use std::collections::BTreeMap;

use arbor_foundation::{EntitySource, ErrorKind, Value};
use arbor_storage::{EntityChange, EntityStorage};

use crate::fixture::Model;

#[test]
fn strict_commits_check_consistency() {
    let model = Model::new();
    let mut b = model.strict().builder();
    let app = model.add_module(&mut b, "app");
    let root = model.add_root(&mut b, "file:///app");
    b.add_child(model.roots, app, root).unwrap();
    let snapshot = b.commit().unwrap();

    assert_eq!(snapshot.version(), 1);
    assert!(snapshot.config().consistency_checks);
    assert!(snapshot.assert_consistency().is_ok());

    let next = snapshot.builder().commit().unwrap();
    assert_eq!(next.version(), 2);
}

#[test]
fn snapshots_are_isolated_from_later_builders() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let first = b.commit().unwrap();

    let mut b = first.builder();
    b.set_field(app, "name", "application").unwrap();
    let lib = model.add_library(&mut b, "guava");
    let second = b.commit().unwrap();

    assert_eq!(first.entity(app).unwrap().get_str("name"), Some("app"));
    assert_eq!(second.entity(app).unwrap().get_str("name"), Some("application"));
    assert!(!first.contains(lib));
    assert!(second.contains(lib));
}

#[test]
fn readers_share_a_snapshot_while_a_builder_edits() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let ids: Vec<_> = (0..16)
        .map(|i| model.add_module(&mut b, &format!("m{i}")))
        .collect();
    let snapshot = b.commit().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let snapshot = snapshot.clone();
            let ids = ids.clone();
            std::thread::spawn(move || {
                ids.iter()
                    .filter(|&&id| snapshot.entity(id).is_ok())
                    .count()
            })
        })
        .collect();

    let mut writer = snapshot.builder();
    for &id in &ids[..8] {
        writer.remove(id).unwrap();
    }
    let trimmed = writer.commit().unwrap();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), 16);
    }
    assert_eq!(snapshot.entity_count(), 16);
    assert_eq!(trimmed.entity_count(), 8);
}

#[test]
fn change_log_merges_per_entity() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let core = model.add_module(&mut b, "core");
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    assert!(!b.has_changes());
    b.set_field(app, "name", "application").unwrap();
    b.set_field(app, "name", "app2").unwrap();
    b.remove(core).unwrap();
    let lib = model.add_library(&mut b, "guava");
    b.set_field(lib, "roots", Value::list([Value::from("guava.jar")]))
        .unwrap();

    let changes = b.collect_changes();
    assert_eq!(changes.len(), 3);
    for change in &changes {
        match change {
            EntityChange::Replaced { id, old, new } => {
                assert_eq!(*id, app);
                assert_eq!(old.field(0), Some(&Value::from("app")));
                assert_eq!(new.field(0), Some(&Value::from("app2")));
            }
            EntityChange::Removed { id, .. } => assert_eq!(*id, core),
            EntityChange::Added { id, data } => {
                assert_eq!(*id, lib);
                assert_eq!(data.field(1), Some(&Value::list([Value::from("guava.jar")])));
            }
        }
    }
    assert_eq!(b.modification_count(), 5);

    b.reset_changes();
    assert!(!b.has_changes());
    assert!(b.collect_changes().is_empty());
    assert!(b.commit().is_ok());
}

#[test]
fn replacing_with_equal_entities_is_not_a_change_in_content() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let root = model.add_root(&mut b, "file:///app");
    b.add_child(model.roots, app, root).unwrap();
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    b.remove(app).unwrap();
    let app2 = model.add_module(&mut b, "app");
    let root2 = model.add_root(&mut b, "file:///app");
    b.add_child(model.roots, app2, root2).unwrap();
    assert!(b.has_changes());
    assert!(b.has_same_entities());

    b.set_field(root2, "url", "file:///other").unwrap();
    assert!(!b.has_same_entities());
}

#[test]
fn entities_are_indexed_by_source() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = b
        .add(model.module, "gradle", &[("name", Value::from("app"))])
        .unwrap();
    let core = b
        .add(model.module, "maven", &[("name", Value::from("core"))])
        .unwrap();
    let lib = b
        .add(model.library, "gradle", &[("name", Value::from("guava"))])
        .unwrap();
    b.change_source(core, "gradle").unwrap();
    b.change_source(lib, "manual").unwrap();
    let snapshot = b.commit().unwrap();

    let gradle = snapshot
        .view()
        .entities_by_source(|source| source.as_str() == "gradle");
    let expected = BTreeMap::from([(EntitySource::new("gradle"), vec![app, core])]);
    assert_eq!(gradle, expected);
    assert_eq!(snapshot.view().entities_by_source(|_| true).len(), 2);
    assert_eq!(snapshot.entity(lib).unwrap().source().as_str(), "manual");
}

#[test]
fn missing_entities_report_not_found() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let app = model.add_module(&mut b, "app");
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    b.remove(app).unwrap();
    let err = b.entity(app).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::EntityNotFound(_) | ErrorKind::StaleEntity(_)
    ));
    assert!(snapshot.entity(app).is_ok());
}
