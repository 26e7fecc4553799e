//! Integration tests for persistent collections
//!
//! Tests ArVec, ArSet, ArMap with structural sharing and immutability.

use arbor_foundation::{ArMap, ArSet, ArVec, Value};

// =============================================================================
// ArVec
// =============================================================================

#[test]
fn vector_empty() {
    let v: ArVec<Value> = ArVec::new();
    assert!(v.is_empty());
    assert_eq!(v.len(), 0);
    assert_eq!(v.first(), None);
}

#[test]
fn vector_push_back_leaves_original() {
    let v1 = ArVec::new().push_back(Value::Int(1));
    let v2 = v1.push_back(Value::Int(2));

    assert_eq!(v1.len(), 1);
    assert_eq!(v2.len(), 2);
    assert_eq!(v2.get(1), Some(&Value::Int(2)));
}

#[test]
fn vector_update() {
    let v: ArVec<Value> = (0..3).map(Value::from).collect();
    let updated = v.update(1, Value::from("x")).unwrap();

    assert_eq!(v.get(1), Some(&Value::Int(1)));
    assert_eq!(updated.get(1), Some(&Value::from("x")));
    assert!(v.update(3, Value::Nil).is_none());
}

#[test]
fn vector_equality_is_structural() {
    let a: ArVec<Value> = vec![Value::Int(1), Value::Int(2)].into();
    let b = ArVec::new().push_back(Value::Int(1)).push_back(Value::Int(2));
    assert_eq!(a, b);
}

#[test]
fn vector_iteration_order() {
    let v: ArVec<Value> = (0..100).map(Value::from).collect();
    let collected: Vec<i64> = v.iter().filter_map(Value::as_int).collect();
    assert_eq!(collected, (0..100).collect::<Vec<_>>());
}

// =============================================================================
// ArSet
// =============================================================================

#[test]
fn set_insert_and_remove() {
    let s1 = ArSet::new().insert(Value::from("a"));
    let s2 = s1.insert(Value::from("b")).insert(Value::from("a"));
    let s3 = s2.remove(&Value::from("a"));

    assert_eq!(s1.len(), 1);
    assert_eq!(s2.len(), 2);
    assert!(!s3.contains(&Value::from("a")));
    assert!(s3.contains(&Value::from("b")));
}

#[test]
fn set_equality_ignores_insertion_order() {
    let a: ArSet<Value> = [1, 2, 3].into_iter().map(Value::from).collect();
    let b: ArSet<Value> = [3, 1, 2].into_iter().map(Value::from).collect();
    assert_eq!(a, b);
}

// =============================================================================
// ArMap
// =============================================================================

#[test]
fn map_insert_get_remove() {
    let m1 = ArMap::new().insert(Value::from("k"), Value::Int(1));
    let m2 = m1.insert(Value::from("k"), Value::Int(2));
    let m3 = m2.remove(&Value::from("k"));

    assert_eq!(m1.get(&Value::from("k")), Some(&Value::Int(1)));
    assert_eq!(m2.get(&Value::from("k")), Some(&Value::Int(2)));
    assert!(m3.is_empty());
}

#[test]
fn map_keys_and_values() {
    let m: ArMap<Value, Value> = (0..5).map(|i| (Value::from(i), Value::from(i * 10))).collect();
    assert_eq!(m.keys().count(), 5);
    assert_eq!(
        m.values().filter_map(Value::as_int).sum::<i64>(),
        100
    );
    assert!(m.contains_key(&Value::from(3)));
}
