//! Relation scenarios
//!
//! One-to-one replacement, ordered children, mandatory parents at commit,
//! and idempotent edits.

use arbor_foundation::{ErrorKind, Value};
use arbor_storage::{EntityChange, EntityStorage};
use proptest::prelude::*;

use crate::fixture::Model;

// =============================================================================
// One-to-one
// =============================================================================

#[test]
fn one_to_one_set_detaches_previous_occupants() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let m1 = model.add_module(&mut b, "a");
    let m2 = model.add_module(&mut b, "b");
    let s1 = b.add(model.settings, "test", &[]).unwrap();
    let s2 = b.add(model.settings, "test", &[]).unwrap();

    b.set_one_to_one(model.module_settings, m1, Some(s1)).unwrap();
    assert_eq!(b.child(model.module_settings, m1), Some(s1));
    assert_eq!(b.parent(model.module_settings, s1), Some(m1));

    // Replacing the parent's child
    let delta = b.set_one_to_one(model.module_settings, m1, Some(s2)).unwrap();
    assert_eq!(delta.attached.len(), 1);
    assert_eq!(delta.detached.len(), 1);
    assert_eq!(b.child(model.module_settings, m1), Some(s2));
    assert_eq!(b.parent(model.module_settings, s1), None);

    // Moving the child to another parent
    b.set_one_to_one(model.module_settings, m2, Some(s2)).unwrap();
    assert_eq!(b.child(model.module_settings, m1), None);
    assert_eq!(b.child(model.module_settings, m2), Some(s2));
    assert_eq!(b.parent(model.module_settings, s2), Some(m2));

    let snapshot = b.commit().unwrap();
    assert!(snapshot.assert_consistency().is_ok());
}

// =============================================================================
// One-to-many
// =============================================================================

#[test]
fn set_children_keeps_order_and_detaches_dropped_children() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let m = model.add_module(&mut b, "core");
    let c1 = model.add_root(&mut b, "file:///1");
    let c2 = model.add_root(&mut b, "file:///2");
    let c3 = model.add_root(&mut b, "file:///3");

    b.set_children(model.roots, m, &[c1, c2, c3]).unwrap();
    assert_eq!(b.children(model.roots, m), vec![c1, c2, c3]);
    for c in [c1, c2, c3] {
        assert_eq!(b.parent(model.roots, c), Some(m));
    }

    let delta = b.set_children(model.roots, m, &[c3, c1]).unwrap();
    assert_eq!(delta.detached.len(), 1);
    assert!(delta.reordered);
    assert_eq!(b.children(model.roots, m), vec![c3, c1]);
    assert_eq!(b.parent(model.roots, c2), None);
}

#[test]
fn new_children_leave_their_previous_parent() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let a = model.add_module(&mut b, "a");
    let z = model.add_module(&mut b, "z");
    let c1 = model.add_root(&mut b, "file:///1");
    let c2 = model.add_root(&mut b, "file:///2");

    b.set_children(model.roots, a, &[c1, c2]).unwrap();
    b.set_children(model.roots, z, &[c2]).unwrap();

    assert_eq!(b.children(model.roots, a), vec![c1]);
    assert_eq!(b.children(model.roots, z), vec![c2]);

    b.set_one_to_many_parent(model.roots, c1, Some(z)).unwrap();
    assert!(b.children(model.roots, a).is_empty());
    assert_eq!(b.children(model.roots, z), vec![c2, c1]);
}

#[test]
fn set_children_is_idempotent() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let m = model.add_module(&mut b, "core");
    let kids: Vec<_> = (0..3)
        .map(|i| model.add_root(&mut b, &format!("file:///{i}")))
        .collect();
    b.set_children(model.roots, m, &kids).unwrap();
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    let delta = b.set_children(model.roots, m, &kids).unwrap();
    assert!(delta.is_empty());
    assert!(!b.has_changes());
    assert_eq!(b.modification_count(), 0);

    // Re-adding an existing child is also a no-op
    assert!(b.add_child(model.roots, m, kids[1]).unwrap().is_empty());
    assert_eq!(b.children(model.roots, m), kids);
}

// =============================================================================
// Commit-time validation
// =============================================================================

#[test]
fn commit_fails_while_a_mandatory_parent_is_missing() {
    let model = Model::new();
    let base = model.empty();
    let mut b = base.builder();
    let m = model.add_module(&mut b, "core");
    let orphan = model.add_root(&mut b, "file:///orphan");

    let err = b.commit().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UninitializedField { .. }));
    assert!(!base.contains(orphan));

    // The builder is still usable after a failed commit
    b.add_child(model.roots, m, orphan).unwrap();
    let snapshot = b.commit().unwrap();
    assert!(snapshot.contains(orphan));
    assert_eq!(
        snapshot
            .entity(orphan)
            .unwrap()
            .required_parent(model.roots)
            .unwrap(),
        m
    );
}

#[test]
fn dropping_a_child_and_removing_it_commits() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let m = model.add_module(&mut b, "core");
    let c1 = model.add_root(&mut b, "file:///1");
    let c2 = model.add_root(&mut b, "file:///2");
    b.set_children(model.roots, m, &[c1, c2]).unwrap();
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    b.set_children(model.roots, m, &[c2]).unwrap();
    assert!(b.commit().is_err());
    b.remove(c1).unwrap();
    let next = b.commit().unwrap();

    assert!(!next.contains(c1));
    assert!(snapshot.contains(c1));
    assert_eq!(next.children(model.roots, m), vec![c2]);
}

#[test]
fn removing_a_module_cascades_through_nested_children() {
    let model = Model::new();
    let mut b = model.empty().builder();
    let m = model.add_module(&mut b, "core");
    let root = model.add_root(&mut b, "file:///core");
    let src = b
        .add(model.source_root, "test", &[("url", Value::from("file:///core/src"))])
        .unwrap();
    b.add_child(model.roots, m, root).unwrap();
    b.add_child(model.sources, root, src).unwrap();
    let snapshot = b.commit().unwrap();

    let mut b = snapshot.builder();
    let removed = b.remove(m).unwrap();
    assert_eq!(removed, vec![m, root, src]);

    let changes = b.collect_changes();
    assert_eq!(changes.len(), 3);
    assert!(changes.iter().all(|c| matches!(c, EntityChange::Removed { .. })));

    let next = b.commit().unwrap();
    assert_eq!(next.entity_count(), 0);
    assert!(next.assert_consistency().is_ok());
}

// =============================================================================
// Random edit sequences
// =============================================================================

#[derive(Debug, Clone)]
enum Edit {
    /// Append root `r` to module `m`.
    Add { m: usize, r: usize },
    /// Replace module `m`'s roots with the listed ones.
    Set { m: usize, roots: Vec<usize> },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0..3usize, 0..6usize).prop_map(|(m, r)| Edit::Add { m, r }),
        (0..3usize, proptest::sample::subsequence((0..6usize).collect::<Vec<_>>(), 0..6))
            .prop_map(|(m, roots)| Edit::Set { m, roots }),
    ]
}

proptest! {
    #[test]
    fn every_root_keeps_at_most_one_parent(edits in proptest::collection::vec(edit(), 1..40)) {
        let model = Model::new();
        let mut b = model.empty().builder();
        let modules: Vec<_> = (0..3).map(|i| model.add_module(&mut b, &format!("m{i}"))).collect();
        let roots: Vec<_> = (0..6).map(|i| model.add_root(&mut b, &format!("file:///{i}"))).collect();

        for edit in edits {
            match edit {
                Edit::Add { m, r } => {
                    b.add_child(model.roots, modules[m], roots[r]).unwrap();
                }
                Edit::Set { m, roots: picked } => {
                    let ids: Vec<_> = picked.iter().map(|&r| roots[r]).collect();
                    b.set_children(model.roots, modules[m], &ids).unwrap();
                }
            }
        }

        let mut seen = 0;
        for &m in &modules {
            for child in b.children(model.roots, m) {
                prop_assert_eq!(b.parent(model.roots, child), Some(m));
                seen += 1;
            }
        }
        let parented = roots.iter().filter(|&&r| b.parent(model.roots, r).is_some()).count();
        prop_assert_eq!(seen, parented);

        // Drop the orphans so the rest commits under full checks
        for &r in &roots {
            if b.parent(model.roots, r).is_none() {
                b.remove(r).unwrap();
            }
        }
        let snapshot = b.commit().unwrap();
        prop_assert!(snapshot.assert_consistency().is_ok());
    }
}
