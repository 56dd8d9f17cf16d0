//! Shared entity declarations and store setup.

use std::sync::Arc;

use kvmodel_core::config::ModelConfig;
use kvmodel_core::schema::{EntityDecl, FieldSpec, SchemaBuilder};
use kvmodel_core::store::{Connection, MemoryStore};
use kvmodel_core::types::ValueKind;
use kvmodel_core::Model;

/// Entity with one field of every kind.
pub struct Profile;

impl EntityDecl for Profile {
    const NAME: &'static str = "Profile";

    fn declare() -> SchemaBuilder {
        SchemaBuilder::new(Self::NAME)
            .table("profiles")
            .field(FieldSpec::new("id", ValueKind::String).hash_key())
            .field(FieldSpec::new("name", ValueKind::String))
            .field(FieldSpec::new("age", ValueKind::Integer))
            .field(FieldSpec::new("score", ValueKind::Float))
            .field(FieldSpec::new("active", ValueKind::Boolean))
            .field(FieldSpec::new("tags", ValueKind::StringSet))
            .field(FieldSpec::new("lucky", ValueKind::NumberSet))
            .field(FieldSpec::new("extra", ValueKind::Json))
            .field(FieldSpec::new("history", ValueKind::JsonList))
            .field(FieldSpec::new("prefs", ValueKind::JsonMap))
            .field(FieldSpec::new("status", ValueKind::String).default_value("new"))
    }
}

/// Entity keyed by a composite template.
pub struct Membership;

impl EntityDecl for Membership {
    const NAME: &'static str = "Membership";

    fn declare() -> SchemaBuilder {
        SchemaBuilder::new(Self::NAME)
            .table("memberships")
            .capacity(4, 2)
            .key_template("{org}:{user}")
            .field(FieldSpec::new("id", ValueKind::String).hash_key())
            .field(FieldSpec::new("org", ValueKind::String))
            .field(FieldSpec::new("user", ValueKind::Integer))
            .field(FieldSpec::new("role", ValueKind::String))
    }
}

/// Entity with hash and range keys.
pub struct Event;

impl EntityDecl for Event {
    const NAME: &'static str = "Event";

    fn declare() -> SchemaBuilder {
        SchemaBuilder::new(Self::NAME)
            .table("events")
            .field(FieldSpec::new("stream", ValueKind::String).hash_key())
            .field(FieldSpec::new("seq", ValueKind::Integer).range_key())
            .field(FieldSpec::new("body", ValueKind::String))
    }
}

/// Entity whose hash key is generated on create.
pub struct Note;

impl EntityDecl for Note {
    const NAME: &'static str = "Note";

    fn declare() -> SchemaBuilder {
        SchemaBuilder::new(Self::NAME)
            .table("notes")
            .field(FieldSpec::new("id", ValueKind::String).hash_key().auto_generate())
            .field(FieldSpec::new("text", ValueKind::String))
    }
}

/// Configuration with short backoff so retry tests run fast.
pub fn fast_config() -> ModelConfig {
    ModelConfig {
        batch_retry_initial_delay_ms: 1,
        batch_retry_max_delay_ms: 4,
        table_poll_interval_ms: 1,
        ..ModelConfig::default()
    }
}

/// Model of `T` over `store`, with its table created.
pub fn model_on<T: EntityDecl>(store: Arc<MemoryStore>, config: ModelConfig) -> Model {
    let model = Model::of::<T>(Connection::with_config(store, config)).unwrap();
    model.create_table(true).unwrap();
    model
}

/// Fresh store plus a model of `T` on it.
pub fn setup<T: EntityDecl>() -> (Arc<MemoryStore>, Model) {
    let store = Arc::new(MemoryStore::new());
    let model = model_on::<T>(store.clone(), fast_config());
    (store, model)
}
