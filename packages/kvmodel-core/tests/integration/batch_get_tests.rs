//! Batched retrieval: ordering, paging and retry of unprocessed keys.

use std::sync::Arc;
use std::time::Duration;

use ntest::timeout;
use pretty_assertions::assert_eq;

use kvmodel_core::store::{CancellationFlag, Deadline, MemoryStore, RetryPolicy};
use kvmodel_core::types::{attributes, Value};
use kvmodel_core::{Model, ModelError};

use super::helpers::{fast_config, model_on, setup, Event, Profile};

fn seed(model: &Model, ids: impl IntoIterator<Item = String>) {
    for id in ids {
        let mut entity = model
            .create_with(id.as_str(), attributes([("name", Value::from(id.clone()))]))
            .unwrap();
        entity.save().unwrap();
    }
}

fn ids(entities: &[Option<kvmodel_core::Entity>]) -> Vec<Option<String>> {
    entities
        .iter()
        .map(|e| {
            e.as_ref()
                .map(|e| e.key_value().unwrap().as_str().unwrap().to_string())
        })
        .collect()
}

#[timeout(2000)]
#[test]
fn test_missing_keys_keep_their_slots() {
    let (_, model) = setup::<Profile>();
    seed(&model, ["a".to_string(), "c".to_string()]);

    let found = model.get_many(["a", "b", "c"]).unwrap();
    assert_eq!(
        ids(&found),
        vec![Some("a".to_string()), None, Some("c".to_string())]
    );
    assert_eq!(
        found[2].as_ref().unwrap().get("name").unwrap(),
        &Value::from("c")
    );
}

#[timeout(2000)]
#[test]
fn test_empty_input_makes_no_calls() {
    let (store, model) = setup::<Profile>();
    let found = model.get_many(Vec::<&str>::new()).unwrap();
    assert!(found.is_empty());
    assert_eq!(store.stats().batch_get_calls(), 0);
}

#[timeout(5000)]
#[test]
fn test_large_request_is_chunked_in_order() {
    let (store, model) = setup::<Profile>();
    let keys: Vec<String> = (0..250).map(|i| format!("k{i:03}")).collect();
    seed(&model, keys.iter().filter(|k| !k.ends_with('7')).cloned());

    let found = model.get_many(keys.iter()).unwrap();
    assert_eq!(found.len(), 250);
    for (key, slot) in keys.iter().zip(ids(&found)) {
        if key.ends_with('7') {
            assert_eq!(slot, None);
        } else {
            assert_eq!(slot.as_deref(), Some(key.as_str()));
        }
    }
    assert_eq!(store.stats().batch_get_calls(), 3);
    assert_eq!(store.stats().batch_keys_requested(), 250);
}

#[timeout(5000)]
#[test]
fn test_throttled_store_is_retried_to_completion() {
    let store = Arc::new(MemoryStore::new().with_batch_capacity(30));
    let model = model_on::<Profile>(store.clone(), fast_config());
    let keys: Vec<String> = (0..120).map(|i| format!("t{i}")).collect();
    seed(&model, keys.iter().cloned());

    let mut reversed = keys.clone();
    reversed.reverse();
    let found = model.get_many(reversed.iter()).unwrap();
    assert_eq!(
        ids(&found),
        reversed.iter().cloned().map(Some).collect::<Vec<_>>()
    );
    assert!(store.stats().unprocessed_returned() > 0);
    assert!(store.stats().batch_get_calls() > 2);
}

#[timeout(5000)]
#[test]
fn test_exhausted_retries_report_unprocessed_keys() {
    let store = Arc::new(MemoryStore::new().with_batch_capacity(1));
    let mut config = fast_config();
    config.batch_max_retries = 2;
    let model = model_on::<Profile>(store.clone(), config);
    seed(&model, (0..5).map(|i| format!("u{i}")));

    let err = model
        .get_many((0..5).map(|i| format!("u{i}")))
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::UnprocessedKeys {
            table: "profiles".to_string(),
            remaining: 2,
            attempts: 3,
        }
    );
}

#[timeout(2000)]
#[test]
fn test_repeated_keys_are_fetched_once() {
    let (store, model) = setup::<Profile>();
    seed(&model, ["d".to_string()]);

    let found = model.get_many(["d", "x", "d"]).unwrap();
    assert_eq!(
        ids(&found),
        vec![Some("d".to_string()), None, Some("d".to_string())]
    );
    assert_eq!(store.stats().batch_keys_requested(), 2);
}

#[timeout(2000)]
#[test]
fn test_range_keyed_entities() {
    let (_, model) = setup::<Event>();
    for seq in 1..=3 {
        let mut event = model
            .create_with(("s1", seq), attributes([("body", format!("e{seq}"))]))
            .unwrap();
        event.save().unwrap();
    }

    let found = model.get_many([("s1", 3), ("s1", 9), ("s1", 1)]).unwrap();
    let bodies: Vec<Option<Value>> = found
        .iter()
        .map(|e| e.as_ref().map(|e| e.get("body").unwrap().clone()))
        .collect();
    assert_eq!(
        bodies,
        vec![Some(Value::from("e3")), None, Some(Value::from("e1"))]
    );
}

#[timeout(2000)]
#[test]
fn test_get_or_create_many_fills_gaps() {
    let (store, model) = setup::<Profile>();
    seed(&model, ["have".to_string()]);
    let writes = store.stats().write_calls();

    let entities = model.get_or_create_many(["have", "new"]).unwrap();
    assert!(entities[0].exists());
    assert!(!entities[1].exists());
    assert_eq!(entities[1].key_value().unwrap(), &Value::from("new"));
    assert_eq!(store.stats().write_calls(), writes);
}

#[timeout(2000)]
#[test]
fn test_cancelled_fetch_stops() {
    let store = Arc::new(MemoryStore::new().with_batch_capacity(1));
    let model = model_on::<Profile>(store, fast_config());
    let flag = CancellationFlag::new();
    flag.cancel();

    let mut options = model.batch_options();
    options.deadline = Deadline::none().with_cancellation(flag);
    let err = model.get_many_with(["a", "b"], &options).unwrap_err();
    assert!(matches!(err, ModelError::Cancelled { .. }));
}

#[timeout(2000)]
#[test]
fn test_deadline_bounds_retry_loop() {
    let store = Arc::new(MemoryStore::new().with_batch_capacity(1));
    let model = model_on::<Profile>(store, fast_config());

    let mut options = model.batch_options();
    options.retry = RetryPolicy {
        max_retries: 1_000,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(20),
    };
    options.deadline = Deadline::after(Duration::from_millis(50));
    let keys: Vec<String> = (0..50).map(|i| format!("d{i}")).collect();
    let err = model.get_many_with(keys.iter(), &options).unwrap_err();
    assert!(matches!(err, ModelError::Timeout { .. }));
}
