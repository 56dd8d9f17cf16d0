//! Key composition: turns caller key input into the canonical stored key.

use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::schema::{EntitySchema, FieldSpec};
use crate::types::{Attributes, PrimaryKey, Value};

/// Caller supplied key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyInput {
    /// Already canonical hash key
    Scalar(Value),
    /// Hash key and range key
    Pair(Value, Value),
    /// Attribute map holding the hash key, or the template components
    Fields(Attributes),
}

impl From<Value> for KeyInput {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for KeyInput {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<String> for KeyInput {
    fn from(value: String) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&String> for KeyInput {
    fn from(value: &String) -> Self {
        Self::Scalar(value.as_str().into())
    }
}

impl From<i64> for KeyInput {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i32> for KeyInput {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Attributes> for KeyInput {
    fn from(value: Attributes) -> Self {
        Self::Fields(value)
    }
}

impl<H: Into<Value>, R: Into<Value>> From<(H, R)> for KeyInput {
    fn from((hash, range): (H, R)) -> Self {
        Self::Pair(hash.into(), range.into())
    }
}

/// Renders one template component as key text.
///
/// Returns `Ok(None)` for `Null`, which counts as a missing component.
pub(crate) fn render_component(entity: &str, field: &str, value: &Value) -> Result<Option<String>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(ModelError::InvalidKeyComponent {
                entity: entity.to_string(),
                field: field.to_string(),
                reason: format!("{} values cannot be part of a key", other.type_name()),
            })
        }
    };
    Ok(Some(text))
}

/// Formats the key template from component values.
///
/// # Arguments
/// * `schema` - Schema with a key template
/// * `lookup` - Returns the current value of a component by field name
///
/// # Returns
/// The rendered key, or `MissingKeyComponents` listing every absent
/// component in template order.
pub(crate) fn compose_template<'a, F>(schema: &EntitySchema, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<&'a Value>,
{
    let Some(template) = schema.template() else {
        return Err(ModelError::MissingKeyComponents {
            entity: schema.name().to_string(),
            missing: vec![schema.hash_key().name.clone()],
        });
    };

    let mut components = BTreeMap::new();
    let mut missing = Vec::new();
    for name in template.placeholders() {
        let rendered = match lookup(name) {
            Some(value) => render_component(schema.name(), name, value)?,
            None => None,
        };
        match rendered {
            Some(text) => {
                components.insert(name.clone(), text);
            }
            None => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(ModelError::MissingKeyComponents {
            entity: schema.name().to_string(),
            missing,
        });
    }
    template
        .render(&components)
        .ok_or_else(|| ModelError::MissingKeyComponents {
            entity: schema.name().to_string(),
            missing: template.placeholders().to_vec(),
        })
}

fn missing(schema: &EntitySchema, field: &FieldSpec) -> ModelError {
    ModelError::MissingKeyComponents {
        entity: schema.name().to_string(),
        missing: vec![field.name.clone()],
    }
}

/// Resolves the canonical hash key value.
///
/// A map carrying the hash key field wins; otherwise a map is formatted
/// through the key template when one is declared; a scalar is taken as
/// already canonical.
pub fn prepare_key(schema: &EntitySchema, input: &KeyInput) -> Result<Value> {
    let hash_field = schema.hash_key();
    let key = match input {
        KeyInput::Scalar(value) | KeyInput::Pair(value, _) => value.clone(),
        KeyInput::Fields(map) => match map.get(&hash_field.name) {
            Some(value) if !value.is_null() => value.clone(),
            _ => Value::String(compose_template(schema, |name| map.get(name))?),
        },
    };

    if key.is_null() {
        return Err(missing(schema, hash_field));
    }
    hash_field.validate(&key)?;
    Ok(key)
}

/// Resolves the full wire key, including the range key when declared.
pub fn prepare_primary_key(schema: &EntitySchema, input: &KeyInput) -> Result<PrimaryKey> {
    let hash_field = schema.hash_key();
    let hash_value = prepare_key(schema, input)?;
    let hash = hash_field
        .from_native(&hash_value)
        .ok_or_else(|| missing(schema, hash_field))?;

    let Some(range_field) = schema.range_key() else {
        if let KeyInput::Pair(_, range) = input {
            if !range.is_null() {
                return Err(ModelError::InvalidKeyComponent {
                    entity: schema.name().to_string(),
                    field: hash_field.name.clone(),
                    reason: "entity declares no range key".to_string(),
                });
            }
        }
        return Ok(PrimaryKey::hash(hash));
    };

    let range_value = match input {
        KeyInput::Pair(_, range) => range.clone(),
        KeyInput::Fields(map) => map.get(&range_field.name).cloned().unwrap_or_default(),
        KeyInput::Scalar(_) => Value::Null,
    };
    range_field.validate(&range_value)?;
    let range = range_field
        .from_native(&range_value)
        .ok_or_else(|| missing(schema, range_field))?;
    Ok(PrimaryKey::composite(hash, range))
}
