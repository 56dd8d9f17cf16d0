//! Process-wide connection handling.
//!
//! The global connection can be installed once per process, so everything
//! touching it lives in a single test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ntest::timeout;
use pretty_assertions::assert_eq;

use kvmodel_core::store::connection::{global, global_or_init, install_global};
use kvmodel_core::store::MemoryStore;
use kvmodel_core::{Connection, Model, ModelConfig, ModelError, Value};

use super::helpers::Note;

#[timeout(2000)]
#[test]
fn test_global_connection_lifecycle() {
    assert!(matches!(global(), Err(ModelError::Connection(_))));

    let inits = AtomicUsize::new(0);
    let store = Arc::new(MemoryStore::new());
    let config = ModelConfig {
        table_prefix: "global_".to_string(),
        ..ModelConfig::default()
    };
    let first = global_or_init(|| {
        inits.fetch_add(1, Ordering::SeqCst);
        Connection::with_config(store.clone(), config)
    });
    let second = global_or_init(|| {
        inits.fetch_add(1, Ordering::SeqCst);
        Connection::new(Arc::new(MemoryStore::new()))
    });
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert!(std::ptr::eq(first, second));
    assert_eq!(global().unwrap().table_name("notes"), "global_notes");

    assert!(matches!(
        install_global(Connection::new(Arc::new(MemoryStore::new()))),
        Err(ModelError::Connection(_))
    ));

    let model = Model::of::<Note>(global().unwrap().clone()).unwrap();
    model.create_table(true).unwrap();
    let mut note = model.create_with(Value::Null, Default::default()).unwrap();
    note.set("text", "hello").unwrap();
    note.save().unwrap();
    assert_eq!(store.item_count("global_notes"), Some(1));
}
