//! Field descriptor: one declared attribute of an entity type.

use std::fmt;
use std::sync::Arc;

use crate::types::{AttributeValue, DecodeError, ValidationError, Value, ValueKind};

/// Caller supplied validation hook, run after the kind check.
pub type ValidatorFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Declared attribute of an entity type.
///
/// Built with [`FieldSpec::new`] and the flag methods, then handed to a
/// [`SchemaBuilder`](super::SchemaBuilder). Immutable once the schema is built.
#[derive(Clone)]
pub struct FieldSpec {
    /// Attribute name in the stored record
    pub name: String,
    /// Declared kind
    pub kind: ValueKind,
    /// Value returned when the attribute is absent
    pub default: Option<Value>,
    /// Partition key flag
    pub is_hash_key: bool,
    /// Sort key flag
    pub is_range_key: bool,
    /// Fill with a fresh lexical id on create when absent
    pub auto_generate: bool,
    validator: Option<Arc<ValidatorFn>>,
}

impl FieldSpec {
    /// Creates a plain field of the given kind.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            is_hash_key: false,
            is_range_key: false,
            auto_generate: false,
            validator: None,
        }
    }

    pub fn hash_key(mut self) -> Self {
        self.is_hash_key = true;
        self
    }

    pub fn range_key(mut self) -> Self {
        self.is_range_key = true;
        self
    }

    pub fn auto_generate(mut self) -> Self {
        self.auto_generate = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attaches a validation hook. An `Err` message rejects the value.
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Returns `true` for hash and range key fields.
    pub fn is_key(&self) -> bool {
        self.is_hash_key || self.is_range_key
    }

    /// Checks a value before it is assigned to this field.
    ///
    /// # Arguments
    /// * `value` - Candidate value
    ///
    /// # Returns
    /// `Ok(())` when the value fits, `Err(ValidationError)` otherwise.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.kind.check(&self.name, value)?;
        if value.is_null() {
            return Ok(());
        }
        if let Some(validator) = &self.validator {
            validator(value).map_err(|message| ValidationError::Rejected {
                field: self.name.clone(),
                message,
            })?;
        }
        Ok(())
    }

    /// Decodes the stored attribute, falling back to the default when absent.
    pub fn to_native(&self, wire: Option<&AttributeValue>) -> Result<Value, DecodeError> {
        match wire {
            Some(wire) if *wire != AttributeValue::Null => self.kind.decode(wire),
            _ => Ok(self
                .default
                .clone()
                .unwrap_or_else(|| self.kind.absent())),
        }
    }

    /// Encodes a validated value. `None` means the attribute is not stored.
    pub fn from_native(&self, value: &Value) -> Option<AttributeValue> {
        self.kind.encode(value)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("is_hash_key", &self.is_hash_key)
            .field("is_range_key", &self.is_range_key)
            .field("auto_generate", &self.auto_generate)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}
