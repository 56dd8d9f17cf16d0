//! Typed entity mapping over a partitioned, capacity-limited key-value store.
//!
//! Provides field descriptors with dirty tracking, entity schemas with
//! composite key templates, full and partial saves, and batched retrieval
//! that pages and retries unprocessed keys.

pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod lexical_uuid;
pub mod schema;
pub mod store;
pub mod types;

pub use config::ModelConfig;
pub use entity::{Entity, Model};
pub use error::{ModelError, Result};
pub use key::KeyInput;
pub use schema::{EntityDecl, FieldSpec, SchemaBuilder, SchemaRegistry};
pub use store::{Connection, MemoryStore, Store};
pub use types::{attributes, Attributes, Value, ValueKind};
