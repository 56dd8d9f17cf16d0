//! Entity declaration errors.

use thiserror::Error;

use crate::types::ValidationError;

/// Errors raised while declaring or looking up an entity type.
///
/// All of these are programming errors in the entity declaration and are
/// reported when the schema is built, never at save time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeclarationError {
    /// No field is flagged as the hash key
    #[error("Entity '{entity}' declares no hash key field")]
    MissingHashKey { entity: String },

    /// More than one field is flagged as the hash key
    #[error("Entity '{entity}' declares more than one hash key: '{first}' and '{second}'")]
    DuplicateHashKey {
        entity: String,
        first: String,
        second: String,
    },

    /// More than one field is flagged as the range key
    #[error("Entity '{entity}' declares more than one range key: '{first}' and '{second}'")]
    DuplicateRangeKey {
        entity: String,
        first: String,
        second: String,
    },

    /// Two fields share one name
    #[error("Entity '{entity}' declares field '{field}' twice")]
    DuplicateField { entity: String, field: String },

    /// Concrete entity without a table
    #[error("Entity '{entity}' has no table name")]
    MissingTableName { entity: String },

    /// Key template cannot be parsed
    #[error("Malformed key template '{template}': {reason}")]
    MalformedTemplate { template: String, reason: String },

    /// Template placeholder does not name a declared field
    #[error("Key template of entity '{entity}' references unknown field '{placeholder}'")]
    UnknownPlaceholder { entity: String, placeholder: String },

    /// Templated keys are strings, so the hash key field must be one
    #[error("Entity '{entity}' uses a key template but hash key '{field}' is not a string field")]
    TemplateRequiresStringKey { entity: String, field: String },

    /// Generated ids are strings
    #[error("Field '{field}' of entity '{entity}' is auto-generated but not a string field")]
    AutoGenerateRequiresString { entity: String, field: String },

    /// Key fields must be strings or numbers
    #[error("Key field '{field}' of entity '{entity}' has unsupported kind {kind}")]
    InvalidKeyKind {
        entity: String,
        field: String,
        kind: &'static str,
    },

    /// Default value does not pass the field's own validation
    #[error("Default of field '{field}' in entity '{entity}' is invalid: {source}")]
    InvalidDefault {
        entity: String,
        field: String,
        source: ValidationError,
    },

    /// Lookup hit an abstract declaration
    #[error("Entity '{entity}' is abstract; operate on a concrete entity type")]
    AbstractEntity { entity: String },

    /// Lookup of a name never registered
    #[error("Entity '{entity}' is not registered")]
    UnknownEntity { entity: String },

    /// Second registration under one name
    #[error("Entity '{entity}' is already registered")]
    AlreadyRegistered { entity: String },
}
