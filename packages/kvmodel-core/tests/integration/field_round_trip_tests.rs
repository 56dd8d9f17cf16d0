//! Field values survive save and reload.

use ntest::timeout;
use pretty_assertions::assert_eq;
use serde_json::json;

use kvmodel_core::lexical_uuid::LexicalUuid;
use kvmodel_core::types::{attributes, number_set, string_set, Value};
use kvmodel_core::ModelError;

use super::helpers::{setup, Membership, Note, Profile};

#[timeout(2000)]
#[test]
fn test_every_kind_round_trips() {
    let (_, model) = setup::<Profile>();
    let mut entity = model.create("p1").unwrap();
    let values = [
        ("name", Value::from("Ada")),
        ("age", Value::from(36)),
        ("score", Value::from(1.11)),
        ("active", Value::from(true)),
        ("tags", string_set(["a", "b", "c"])),
        ("lucky", number_set([5, 3, 9])),
        ("extra", Value::from(json!({"a": "b", "c": {"d": "e"}}))),
        ("history", Value::from(json!([5, 6, "seven"]))),
        ("prefs", Value::from(json!({"theme": "dark"}))),
    ];
    for (name, value) in &values {
        entity.set(name, value.clone()).unwrap();
    }
    entity.save().unwrap();

    let loaded = model.get("p1").unwrap();
    assert!(loaded.exists());
    assert!(!loaded.is_dirty());
    for (name, value) in &values {
        assert_eq!(loaded.get(name).unwrap(), value, "field {name}");
    }
}

#[timeout(2000)]
#[test]
fn test_absent_fields_read_as_defaults() {
    let (_, model) = setup::<Profile>();
    model.create("p2").unwrap().save().unwrap();
    let loaded = model.get("p2").unwrap();
    assert_eq!(loaded.get("name").unwrap(), &Value::Null);
    assert_eq!(loaded.get("status").unwrap(), &Value::from("new"));
    assert_eq!(loaded.get("tags").unwrap(), &string_set(Vec::<String>::new()));
    assert_eq!(loaded.get("history").unwrap(), &Value::from(json!([])));
    assert_eq!(loaded.get("prefs").unwrap(), &Value::from(json!({})));
}

#[timeout(2000)]
#[test]
fn test_deleted_field_reads_absent_after_reload() {
    let (store, model) = setup::<Profile>();
    let mut entity = model
        .create_with(
            "p3",
            attributes([("name", Value::from("Ada")), ("status", Value::from("vip"))]),
        )
        .unwrap();
    entity.save().unwrap();

    let mut loaded = model.get("p3").unwrap();
    loaded.delete_field("name").unwrap();
    loaded.set("status", Value::Null).unwrap();
    loaded.save().unwrap();

    let reloaded = model.get("p3").unwrap();
    assert_eq!(reloaded.get("name").unwrap(), &Value::Null);
    assert_eq!(reloaded.get("status").unwrap(), &Value::from("new"));
    assert!(!reloaded.raw().contains_key("name"));
    assert_eq!(store.stats().update_item_calls(), 1);
}

#[timeout(2000)]
#[test]
fn test_create_then_get_by_same_key() {
    let (_, model) = setup::<Membership>();
    let mut entity = model.create("user:1").unwrap();
    entity.save().unwrap();
    let loaded = model.get("user:1").unwrap();
    assert_eq!(loaded.key_value().unwrap(), &Value::from("user:1"));
}

#[timeout(2000)]
#[test]
fn test_templated_key_lookup_by_components() {
    let (_, model) = setup::<Membership>();
    let mut entity = model
        .create(attributes([
            ("org", Value::from("acme")),
            ("user", Value::from(5)),
            ("role", Value::from("owner")),
        ]))
        .unwrap();
    entity.save().unwrap();

    let by_parts = model
        .get(attributes([("org", Value::from("acme")), ("user", Value::from(5))]))
        .unwrap();
    assert_eq!(by_parts.key_value().unwrap(), &Value::from("acme:5"));
    assert_eq!(by_parts.get("role").unwrap(), &Value::from("owner"));

    let err = model.get(attributes([("org", "acme")])).unwrap_err();
    assert_eq!(
        err,
        ModelError::MissingKeyComponents {
            entity: "Membership".to_string(),
            missing: vec!["user".to_string()],
        }
    );
}

#[timeout(2000)]
#[test]
fn test_get_missing_is_not_found() {
    let (_, model) = setup::<Profile>();
    assert!(matches!(
        model.get("ghost"),
        Err(ModelError::NotFound { ref key, .. }) if key == "ghost"
    ));
    assert!(model.find("ghost").unwrap().is_none());
    let created = model.get_or_create("ghost").unwrap();
    assert!(!created.exists());
}

#[timeout(2000)]
#[test]
fn test_auto_generated_keys_are_lexical_ids() {
    let (_, model) = setup::<Note>();
    let mut first = model.create(attributes([("text", "one")])).unwrap();
    let mut second = model.create(attributes([("text", "two")])).unwrap();
    first.save().unwrap();
    second.save().unwrap();

    let a: LexicalUuid = first.key_value().unwrap().as_str().unwrap().parse().unwrap();
    let b: LexicalUuid = second.key_value().unwrap().as_str().unwrap().parse().unwrap();
    assert!(a < b);
    let loaded = model.get(first.key_value().unwrap().clone()).unwrap();
    assert_eq!(loaded.get("text").unwrap(), &Value::from("one"));
}
