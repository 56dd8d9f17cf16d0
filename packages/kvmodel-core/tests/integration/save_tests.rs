//! Save modes, set operations and deletes against the store.

use std::collections::BTreeSet;

use ntest::timeout;
use pretty_assertions::assert_eq;

use kvmodel_core::store::AttributeUpdate;
use kvmodel_core::types::{attributes, number_set, string_set, AttributeValue, Value};
use kvmodel_core::ModelError;

use super::helpers::{setup, Membership, Profile};

fn names(updates: &[AttributeUpdate]) -> Vec<(&'static str, String)> {
    updates
        .iter()
        .map(|u| (u.verb(), u.name().to_string()))
        .collect()
}

#[timeout(2000)]
#[test]
fn test_clean_save_writes_nothing() {
    let (store, model) = setup::<Profile>();
    let mut entity = model.create("s1").unwrap();
    entity.save().unwrap();
    assert_eq!(store.stats().write_calls(), 1);

    entity.save().unwrap();
    let mut loaded = model.get("s1").unwrap();
    loaded.save().unwrap();
    loaded.set("name", Value::Null).unwrap();
    loaded.save().unwrap();
    assert_eq!(store.stats().write_calls(), 1);
}

#[timeout(2000)]
#[test]
fn test_first_save_puts_later_saves_patch() {
    let (store, model) = setup::<Profile>();
    let mut entity = model
        .create_with("s2", attributes([("name", "Ada"), ("status", "vip")]))
        .unwrap();
    entity.save().unwrap();
    assert_eq!(store.stats().put_item_calls(), 1);

    entity.set("age", 40).unwrap();
    entity.delete_field("status").unwrap();
    entity.save().unwrap();
    assert_eq!(store.stats().put_item_calls(), 1);
    let log = store.update_log();
    assert_eq!(log.len(), 1);
    assert_eq!(
        names(&log[0].1),
        vec![("PUT", "age".to_string()), ("DELETE", "status".to_string())]
    );

    let loaded = model.get("s2").unwrap();
    assert_eq!(loaded.get("name").unwrap(), &Value::from("Ada"));
    assert_eq!(loaded.get("age").unwrap(), &Value::from(40));
    assert_eq!(loaded.get("status").unwrap(), &Value::from("new"));
}

#[timeout(2000)]
#[test]
fn test_patch_leaves_concurrent_fields_alone() {
    let (_, model) = setup::<Profile>();
    model
        .create_with("s3", attributes([("name", "Ada")]))
        .unwrap()
        .save()
        .unwrap();

    let mut first = model.get("s3").unwrap();
    let mut second = model.get("s3").unwrap();
    first.set("age", 1).unwrap();
    second.set("name", "Grace").unwrap();
    first.save().unwrap();
    second.save().unwrap();

    let loaded = model.get("s3").unwrap();
    assert_eq!(loaded.get("age").unwrap(), &Value::from(1));
    assert_eq!(loaded.get("name").unwrap(), &Value::from("Grace"));
}

#[timeout(2000)]
#[test]
fn test_force_put_replaces_whole_record() {
    let (store, model) = setup::<Profile>();
    model
        .create_with("s4", attributes([("name", Value::from("Ada")), ("age", Value::from(3))]))
        .unwrap()
        .save()
        .unwrap();

    let mut stale = model.get("s4").unwrap();
    let mut other = model.get("s4").unwrap();
    other.set("score", 2.5).unwrap();
    other.save().unwrap();

    stale.set("name", "Grace").unwrap();
    stale.save_with(true).unwrap();
    assert_eq!(store.stats().put_item_calls(), 2);

    let loaded = model.get("s4").unwrap();
    assert_eq!(loaded.to_attributes().unwrap(), stale.to_attributes().unwrap());
    assert_eq!(loaded.get("score").unwrap(), &Value::Null);
}

#[timeout(2000)]
#[test]
fn test_set_additions_use_add_verb() {
    let (store, model) = setup::<Profile>();
    model
        .create_with("s5", attributes([("tags", string_set(["a"]))]))
        .unwrap()
        .save()
        .unwrap();

    let mut entity = model.get("s5").unwrap();
    entity.add_to_set("tags", string_set(["b", "c"]), false).unwrap();
    entity.add_to_set("lucky", number_set([7]), false).unwrap();
    assert!(!entity.is_dirty());
    assert_eq!(store.stats().put_item_calls(), 1);

    let log = store.update_log();
    assert_eq!(
        log[0].1,
        vec![AttributeUpdate::Add {
            name: "tags".to_string(),
            value: AttributeValue::Ss(["b", "c"].iter().map(|s| s.to_string()).collect()),
        }]
    );
    assert_eq!(names(&log[1].1), vec![("ADD", "lucky".to_string())]);

    let loaded = model.get("s5").unwrap();
    assert_eq!(loaded.get("tags").unwrap(), &string_set(["a", "b", "c"]));
    assert_eq!(loaded.get("lucky").unwrap(), &number_set([7]));
}

#[timeout(2000)]
#[test]
fn test_set_removal_to_empty_drops_attribute() {
    let (_, model) = setup::<Profile>();
    model
        .create_with("s6", attributes([("tags", string_set(["a", "b"]))]))
        .unwrap()
        .save()
        .unwrap();

    let mut entity = model.get("s6").unwrap();
    entity.remove_from_set("tags", string_set(["a"]), false).unwrap();
    assert_eq!(
        model.get("s6").unwrap().get("tags").unwrap(),
        &string_set(["b"])
    );
    entity.remove_from_set("tags", string_set(["b", "zz"]), false).unwrap();

    let loaded = model.get("s6").unwrap();
    assert!(!loaded.raw().contains_key("tags"));
    assert_eq!(
        loaded.get("tags").unwrap(),
        &Value::StringSet(BTreeSet::new())
    );
}

#[timeout(2000)]
#[test]
fn test_staged_set_ops_flush_with_save() {
    let (store, model) = setup::<Profile>();
    model.create("s7").unwrap().save().unwrap();

    let mut entity = model.get("s7").unwrap();
    entity.stage_add_to_set("tags", string_set(["x"])).unwrap();
    entity.stage_add_to_set("tags", string_set(["y"])).unwrap();
    entity.set("name", "Ada").unwrap();
    assert_eq!(
        entity.pending_fields(),
        vec!["name".to_string(), "tags".to_string()]
    );
    entity.save().unwrap();

    let log = store.update_log();
    assert_eq!(
        names(&log[0].1),
        vec![("PUT", "name".to_string()), ("ADD", "tags".to_string())]
    );
    let loaded = model.get("s7").unwrap();
    assert_eq!(loaded.get("tags").unwrap(), &string_set(["x", "y"]));
}

#[timeout(2000)]
#[test]
fn test_delete_is_idempotent() {
    let (store, model) = setup::<Profile>();
    let mut entity = model.create("s8").unwrap();
    entity.save().unwrap();

    assert!(entity.delete().unwrap());
    assert!(!entity.exists());
    assert!(entity.is_dirty());
    assert!(model.find("s8").unwrap().is_none());
    assert!(!entity.delete().unwrap());
    assert_eq!(store.stats().delete_item_calls(), 2);

    entity.save().unwrap();
    assert!(entity.exists());
    assert!(model.find("s8").unwrap().is_some());
}

#[timeout(2000)]
#[test]
fn test_update_applies_all_or_nothing() {
    let (_, model) = setup::<Profile>();
    let mut entity = model.create("s9").unwrap();

    let err = entity
        .update(attributes([("name", Value::from("Ada")), ("age", Value::from("old"))]))
        .unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    assert_eq!(entity.get("name").unwrap(), &Value::Null);

    entity
        .update(attributes([("name", Value::from("Ada")), ("age", Value::from(9))]))
        .unwrap();
    entity.save().unwrap();
    assert_eq!(
        model.get("s9").unwrap().get("age").unwrap(),
        &Value::from(9)
    );

    let mut loaded = model.get("s9").unwrap();
    let err = loaded
        .update(attributes([("age", Value::from(3)), ("id", Value::from("other"))]))
        .unwrap_err();
    assert!(matches!(err, ModelError::KeyImmutable { .. }));
    assert_eq!(loaded.get("age").unwrap(), &Value::from(9));
    assert!(!loaded.is_dirty());
    assert!(loaded.pending_fields().is_empty());
}

#[timeout(2000)]
#[test]
fn test_templated_entity_saves_under_composed_key() {
    let (store, model) = setup::<Membership>();
    let mut entity = model
        .create(attributes([("org", Value::from("acme")), ("user", Value::from(3))]))
        .unwrap();
    entity.set("role", "admin").unwrap();
    entity.save().unwrap();

    assert_eq!(store.item_count("memberships"), Some(1));
    let loaded = model.get("acme:3").unwrap();
    assert_eq!(loaded.get("org").unwrap(), &Value::from("acme"));
    assert_eq!(loaded.get("user").unwrap(), &Value::from(3));
    assert_eq!(loaded.get("role").unwrap(), &Value::from("admin"));
}
