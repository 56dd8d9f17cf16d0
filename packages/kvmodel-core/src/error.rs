//! Crate-level error type.

use thiserror::Error;

use crate::schema::DeclarationError;
use crate::store::StoreError;
use crate::types::{DecodeError, ValidationError};

/// Errors returned by entity operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Single-item lookup found no record
    #[error("{entity} with key '{key}' not found")]
    NotFound { entity: String, key: String },

    /// Value rejected by a field; the entity is unchanged
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entity declaration is invalid or unknown
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Key input lacks fields needed to derive the key
    #[error("Cannot derive key of {entity}: missing {}", .missing.join(", "))]
    MissingKeyComponents { entity: String, missing: Vec<String> },

    /// Key input holds a value that cannot be part of a key
    #[error("Invalid key component '{field}' for {entity}: {reason}")]
    InvalidKeyComponent {
        entity: String,
        field: String,
        reason: String,
    },

    /// Field name not declared on the entity
    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// Key fields cannot change once the record exists
    #[error("Key field '{field}' of a stored {entity} cannot be changed")]
    KeyImmutable { entity: String, field: String },

    /// Operation requires a stored record
    #[error("{entity} has not been saved yet")]
    NotPersisted { entity: String },

    /// Immediate set operation refused while other fields are dirty
    #[error("{entity} has unsaved changes to {}; save first or force", .fields.join(", "))]
    PendingChanges { entity: String, fields: Vec<String> },

    /// Two incompatible staged operations on one field
    #[error("Field '{field}' of {entity} already has a pending {pending}; cannot {requested}")]
    ConflictingFieldOperation {
        entity: String,
        field: String,
        pending: &'static str,
        requested: &'static str,
    },

    /// Batch retry budget exhausted
    #[error("{remaining} keys of table '{table}' still unprocessed after {attempts} attempts")]
    UnprocessedKeys {
        table: String,
        remaining: usize,
        attempts: u32,
    },

    /// Operation deadline passed
    #[error("Operation timeout: {operation}")]
    Timeout { operation: &'static str },

    /// Operation cancelled by the caller
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: &'static str },

    /// Table did not reach the expected state within the poll bound
    #[error("Table '{table}' did not settle after {attempts} polls")]
    AdminTimeout { table: String, attempts: u32 },

    /// Stored attribute does not match the declared field kind
    #[error("Cannot decode field '{field}' of {entity}: {source}")]
    Decode {
        entity: String,
        field: String,
        source: DecodeError,
    },

    /// Backing store failure, surfaced unmodified
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Global connection misuse
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result alias for entity operations.
pub type Result<T, E = ModelError> = std::result::Result<T, E>;
