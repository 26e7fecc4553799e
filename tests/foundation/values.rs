//! Integration tests for Value and identifiers
//!
//! Tests value accessors, equality, hashing, display, and symbolic keys.

use std::collections::HashSet;

use arbor_foundation::{EntityId, EntitySource, EntityTypeId, SymbolicKey, Value, Variant};

const MODULE: EntityTypeId = EntityTypeId::new(0);

// =============================================================================
// Scalars
// =============================================================================

#[test]
fn value_nil() {
    assert!(Value::Nil.is_nil());
    assert_eq!(Value::from(None::<i64>), Value::Nil);
}

#[test]
fn value_accessors() {
    assert_eq!(Value::from(true).as_bool(), Some(true));
    assert_eq!(Value::from(7).as_int(), Some(7));
    assert_eq!(Value::from(1.5).as_float(), Some(1.5));
    assert_eq!(Value::from("core").as_str(), Some("core"));
    assert_eq!(Value::from("core").as_int(), None);
}

#[test]
fn float_equality_is_bitwise() {
    assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    assert_ne!(Value::Float(0.0), Value::Float(-0.0));
}

#[test]
fn value_type_names() {
    assert_eq!(Value::Nil.type_name(), "nil");
    assert_eq!(Value::list([]).type_name(), "list");
    assert_eq!(Value::variant("Sdk", []).type_name(), "variant");
}

// =============================================================================
// Compound values
// =============================================================================

#[test]
fn variant_values() {
    let v = Value::variant("Library", [Value::from("guava"), Value::from("compile")]);
    let variant = v.as_variant().unwrap();
    assert_eq!(&*variant.tag, "Library");
    assert_eq!(variant.fields.len(), 2);
    assert_eq!(v, Value::from(Variant::new("Library", [Value::from("guava"), Value::from("compile")])));
}

#[test]
fn equal_values_hash_equally() {
    let a = Value::map([(Value::from("k"), Value::set([Value::from(1), Value::from(2)]))]);
    let b = Value::map([(Value::from("k"), Value::set([Value::from(2), Value::from(1)]))]);
    let set: HashSet<Value> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn value_display() {
    let link = Value::from(SymbolicKey::named(MODULE, "core"));
    assert_eq!(Value::list([Value::from(1), Value::from(2)]).to_string(), "[1 2]");
    assert_eq!(link.to_string(), "@t0[core]");
    assert_eq!(Value::variant("Sdk", [Value::from("17")]).to_string(), "Sdk(17)");
}

// =============================================================================
// Identifiers
// =============================================================================

#[test]
fn symbolic_key_identity() {
    let a = SymbolicKey::named(MODULE, "core");
    let b = SymbolicKey::new(MODULE, vec![Value::from("core")]);
    let other_type = SymbolicKey::named(EntityTypeId::new(1), "core");

    assert_eq!(a, b);
    assert_ne!(a, other_type);
    assert_eq!(a.entity_type(), MODULE);
    assert_eq!(a.part(0), Some(&Value::from("core")));
}

#[test]
fn entity_ids_order_by_type_then_index() {
    let a = EntityId::new(MODULE, 5, 1);
    let b = EntityId::new(EntityTypeId::new(1), 0, 1);
    assert!(a < b);
    assert!(EntityId::type_range(MODULE).contains(&a));
    assert!(!EntityId::type_range(MODULE).contains(&b));
}

#[test]
fn entity_sources() {
    let a = EntitySource::from("maven");
    let b = EntitySource::new(String::from("maven"));
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "maven");
    assert!(EntitySource::from("gradle") < a);
}
