//! Table lifecycle with bounded status polling.

use std::sync::Arc;

use ntest::timeout;
use pretty_assertions::assert_eq;

use kvmodel_core::store::{MemoryStore, Store, StoreError, TableStatus};
use kvmodel_core::types::ValueKind;
use kvmodel_core::{Connection, Model, ModelError};

use super::helpers::{fast_config, model_on, Event, Membership, Profile};

#[timeout(2000)]
#[test]
fn test_definition_uses_declared_or_default_capacity() {
    let store = Arc::new(MemoryStore::new());
    let declared = Model::of::<Membership>(Connection::new(store.clone())).unwrap();
    let definition = declared.table_definition();
    assert_eq!(definition.name, "memberships");
    assert_eq!((definition.read_units, definition.write_units), (4, 2));
    assert_eq!(definition.hash_key.name, "id");
    assert_eq!(definition.range_key, None);

    let defaulted = Model::of::<Event>(Connection::new(store)).unwrap();
    let definition = defaulted.table_definition();
    assert_eq!((definition.read_units, definition.write_units), (8, 8));
    let range = definition.range_key.unwrap();
    assert_eq!((range.name.as_str(), range.kind), ("seq", ValueKind::Integer));
}

#[timeout(2000)]
#[test]
fn test_prefix_applies_to_table_name() {
    let mut config = fast_config();
    config.table_prefix = "test_".to_string();
    let store = Arc::new(MemoryStore::new());
    let model = model_on::<Profile>(store.clone(), config);
    assert_eq!(model.table_name(), "test_profiles");
    assert_eq!(store.item_count("test_profiles"), Some(0));
}

#[timeout(2000)]
#[test]
fn test_create_waits_for_active() {
    let store = Arc::new(MemoryStore::new().with_transition_polls(3));
    let model = model_on::<Profile>(store.clone(), fast_config());
    assert_eq!(store.stats().describe_table_calls(), 3);
    assert_eq!(
        store.describe_table("profiles").unwrap().status,
        TableStatus::Active
    );
    model.create("a").unwrap().save().unwrap();
}

#[timeout(2000)]
#[test]
fn test_create_gives_up_after_poll_bound() {
    let store = Arc::new(MemoryStore::new().with_transition_polls(5));
    let mut config = fast_config();
    config.table_poll_attempts = 4;
    let model = Model::of::<Profile>(Connection::with_config(store.clone(), config)).unwrap();

    let err = model.create_table(true).unwrap_err();
    assert_eq!(
        err,
        ModelError::AdminTimeout {
            table: "profiles".to_string(),
            attempts: 4,
        }
    );
    assert_eq!(store.stats().describe_table_calls(), 4);
}

#[timeout(2000)]
#[test]
fn test_create_without_wait_returns_immediately() {
    let store = Arc::new(MemoryStore::new().with_transition_polls(2));
    let model = Model::of::<Profile>(Connection::with_config(store.clone(), fast_config())).unwrap();
    model.create_table(false).unwrap();
    assert_eq!(store.stats().describe_table_calls(), 0);
    assert!(matches!(
        model.create("x").unwrap().save(),
        Err(ModelError::Store(StoreError::TableNotActive { .. }))
    ));
}

#[timeout(2000)]
#[test]
fn test_drop_waits_until_gone() {
    let store = Arc::new(MemoryStore::new().with_transition_polls(2));
    let model = model_on::<Profile>(store.clone(), fast_config());
    model.drop_table(true).unwrap();
    assert_eq!(store.item_count("profiles"), None);
    assert!(matches!(
        model.find("a"),
        Err(ModelError::Store(StoreError::TableNotFound { .. }))
    ));
}

#[timeout(2000)]
#[test]
fn test_reset_clears_records() {
    let store = Arc::new(MemoryStore::new());
    let model = model_on::<Profile>(store.clone(), fast_config());
    model.create("a").unwrap().save().unwrap();
    model.create("b").unwrap().save().unwrap();
    assert_eq!(store.item_count("profiles"), Some(2));

    model.reset_table().unwrap();
    assert_eq!(store.item_count("profiles"), Some(0));
    assert!(model.find("a").unwrap().is_none());
}

#[timeout(2000)]
#[test]
fn test_create_existing_table_fails() {
    let store = Arc::new(MemoryStore::new());
    let model = model_on::<Profile>(store, fast_config());
    assert!(matches!(
        model.create_table(false),
        Err(ModelError::Store(StoreError::TableAlreadyExists(_)))
    ));
}
