//! Backing store capability, the in-memory reference store, retry helpers
//! and the connection handle.

pub mod connection;
pub mod memory;
pub mod retry;
mod update;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Item, PrimaryKey, ValueKind};

pub use connection::Connection;
pub use memory::{MemoryStore, StoreStats};
pub use retry::{CancellationFlag, Deadline, RetryPolicy};
pub use update::AttributeUpdate;

/// Largest number of keys one `batch_get_item` call may carry.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Backing store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Table does not exist
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    /// Table is being created or deleted
    #[error("Table '{table}' is in use")]
    TableInUse { table: String },

    /// Table name already taken
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Table exists but is not active yet
    #[error("Table '{table}' is not active")]
    TableNotActive { table: String },

    /// Request rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result of one `batch_get_item` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    /// Records found; keys with no record are simply absent
    pub items: Vec<Item>,
    /// Keys the store did not get to; the caller must resend them
    pub unprocessed: Vec<PrimaryKey>,
    /// Read capacity consumed by the call
    pub consumed_capacity: f64,
}

/// Key attribute of a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    pub kind: ValueKind,
}

/// Parameters of a `create_table` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub hash_key: KeyAttribute,
    pub range_key: Option<KeyAttribute>,
    pub read_units: u64,
    pub write_units: u64,
}

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
    Deleting,
}

/// Result of `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub status: TableStatus,
    pub item_count: usize,
}

/// Operations the mapping layer needs from a partitioned key-value store.
///
/// Calls are blocking. Implementations are shared across threads.
pub trait Store: Send + Sync {
    /// Reads one record.
    fn get_item(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>, StoreError>;

    /// Writes a whole record, replacing any record with the same key.
    fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError>;

    /// Applies attribute updates to one record, creating it if absent.
    fn update_item(
        &self,
        table: &str,
        key: &PrimaryKey,
        updates: &[AttributeUpdate],
    ) -> Result<(), StoreError>;

    /// Removes one record. Returns `true` if a record was removed.
    fn delete_item(&self, table: &str, key: &PrimaryKey) -> Result<bool, StoreError>;

    /// Reads up to [`MAX_BATCH_GET_KEYS`] records. May return part of the
    /// keys as unprocessed.
    fn batch_get_item(&self, table: &str, keys: &[PrimaryKey])
        -> Result<BatchGetOutput, StoreError>;

    /// Starts creating a table.
    fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError>;

    /// Starts deleting a table.
    fn delete_table(&self, table: &str) -> Result<(), StoreError>;

    /// Reports table status.
    fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError>;
}
