//! Value kinds and their wire codec.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::attribute::AttributeValue;
use super::error::{DecodeError, ValidationError};
use super::value::{Number, Value};

/// Declared kind of an entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    StringSet,
    NumberSet,
    /// Any JSON document, stored as JSON text
    Json,
    /// JSON array, defaults to `[]`
    JsonList,
    /// JSON object, defaults to `{}`
    JsonMap,
}

impl ValueKind {
    /// Human readable name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::StringSet => "string set",
            Self::NumberSet => "number set",
            Self::Json => "json",
            Self::JsonList => "json list",
            Self::JsonMap => "json map",
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, Self::StringSet | Self::NumberSet)
    }

    /// Kinds that may hold a hash or range key.
    pub fn is_scalar_key(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Float)
    }

    /// Value returned for an attribute that is not stored.
    pub fn absent(self) -> Value {
        match self {
            Self::StringSet => Value::StringSet(BTreeSet::new()),
            Self::NumberSet => Value::NumberSet(BTreeSet::new()),
            Self::JsonList => Value::Json(serde_json::Value::Array(Vec::new())),
            Self::JsonMap => Value::Json(serde_json::Value::Object(serde_json::Map::new())),
            _ => Value::Null,
        }
    }

    /// Checks that `value` has the shape this kind requires.
    ///
    /// `Null` always passes; assigning it removes the attribute.
    pub fn check(self, field: &str, value: &Value) -> Result<(), ValidationError> {
        let ok = match (self, value) {
            (_, Value::Null) => true,
            (Self::String, Value::String(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Float, Value::Float(_))
            | (Self::Boolean, Value::Bool(_))
            | (Self::StringSet, Value::StringSet(_))
            | (Self::NumberSet, Value::NumberSet(_))
            | (Self::Json, Value::Json(_))
            | (Self::JsonList, Value::Json(serde_json::Value::Array(_)))
            | (Self::JsonMap, Value::Json(serde_json::Value::Object(_))) => true,
            _ => false,
        };
        if !ok {
            return Err(ValidationError::TypeMismatch {
                field: field.to_string(),
                expected: self.name(),
                found: value.type_name(),
            });
        }

        match value {
            Value::Float(f) if !f.is_finite() => Err(ValidationError::NonFiniteNumber {
                field: field.to_string(),
                value: *f,
            }),
            Value::NumberSet(set) => match set.iter().find(|n| !n.is_finite()) {
                Some(n) => Err(ValidationError::NonFiniteNumber {
                    field: field.to_string(),
                    value: n.as_f64(),
                }),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Encodes a checked value to its wire form.
    ///
    /// Returns `None` when the attribute should not be stored: `Null` and
    /// empty sets.
    pub fn encode(self, value: &Value) -> Option<AttributeValue> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(AttributeValue::S(s.clone())),
            Value::Integer(i) => Some(AttributeValue::N(i.to_string())),
            Value::Float(f) => Some(AttributeValue::N(f.to_string())),
            Value::Bool(b) => Some(AttributeValue::Bool(*b)),
            Value::StringSet(set) if set.is_empty() => None,
            Value::StringSet(set) => Some(AttributeValue::Ss(set.clone())),
            Value::NumberSet(set) if set.is_empty() => None,
            Value::NumberSet(set) => Some(AttributeValue::Ns(
                set.iter().map(Number::to_string).collect(),
            )),
            Value::Json(json) => Some(AttributeValue::S(json.to_string())),
        }
    }

    /// Decodes a stored wire value into the caller-side value.
    pub fn decode(self, wire: &AttributeValue) -> Result<Value, DecodeError> {
        let mismatch = |detail: &str| DecodeError {
            expected: self.name(),
            found: wire.type_tag(),
            detail: detail.to_string(),
        };

        match (self, wire) {
            (_, AttributeValue::Null) => Ok(self.absent()),
            (Self::String, AttributeValue::S(s)) => Ok(Value::String(s.clone())),
            (Self::Integer, AttributeValue::N(n)) => n
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| mismatch(&e.to_string())),
            (Self::Float, AttributeValue::N(n)) => n
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| mismatch(&e.to_string())),
            (Self::Boolean, AttributeValue::Bool(b)) => Ok(Value::Bool(*b)),
            // Older records store booleans as 0/1 numbers.
            (Self::Boolean, AttributeValue::N(n)) => match n.as_str() {
                "0" => Ok(Value::Bool(false)),
                "1" => Ok(Value::Bool(true)),
                _ => Err(mismatch("expected 0 or 1")),
            },
            (Self::StringSet, AttributeValue::Ss(set)) => Ok(Value::StringSet(set.clone())),
            (Self::NumberSet, AttributeValue::Ns(set)) => set
                .iter()
                .map(|n| Number::parse(n).ok_or_else(|| mismatch(&format!("bad number {n:?}"))))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::NumberSet),
            (Self::Json | Self::JsonList | Self::JsonMap, AttributeValue::S(text)) => {
                let json: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| mismatch(&e.to_string()))?;
                let value = Value::Json(json);
                self.check("", &value)
                    .map_err(|_| mismatch("json document has the wrong shape"))?;
                Ok(value)
            }
            _ => Err(mismatch("wire type does not match field kind")),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
