//! Build-time checks on entity declarations.

use std::collections::HashMap;

use super::error::DeclarationError;
use super::field::FieldSpec;
use super::template::KeyTemplate;
use crate::types::ValueKind;

/// Positions of the key fields within the field list.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KeyPositions {
    pub hash: Option<usize>,
    pub range: Option<usize>,
}

/// Builds the name to position lookup, rejecting duplicate names.
pub(crate) fn index_fields(
    entity: &str,
    fields: &[FieldSpec],
) -> Result<HashMap<String, usize>, DeclarationError> {
    let mut index = HashMap::with_capacity(fields.len());
    for (pos, field) in fields.iter().enumerate() {
        if index.insert(field.name.clone(), pos).is_some() {
            return Err(DeclarationError::DuplicateField {
                entity: entity.to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(index)
}

/// Finds the hash and range key fields, allowing at most one of each.
///
/// # Arguments
/// * `entity` - Entity name, for error messages
/// * `fields` - Declared fields in order
///
/// # Returns
/// Positions of the key fields. A missing hash key is reported by the caller
/// because abstract declarations may omit it.
pub(crate) fn locate_keys(
    entity: &str,
    fields: &[FieldSpec],
) -> Result<KeyPositions, DeclarationError> {
    let mut keys = KeyPositions::default();
    for (pos, field) in fields.iter().enumerate() {
        if field.is_hash_key {
            if let Some(first) = keys.hash {
                return Err(DeclarationError::DuplicateHashKey {
                    entity: entity.to_string(),
                    first: fields[first].name.clone(),
                    second: field.name.clone(),
                });
            }
            keys.hash = Some(pos);
        }
        if field.is_range_key {
            if let Some(first) = keys.range {
                return Err(DeclarationError::DuplicateRangeKey {
                    entity: entity.to_string(),
                    first: fields[first].name.clone(),
                    second: field.name.clone(),
                });
            }
            keys.range = Some(pos);
        }
    }
    Ok(keys)
}

/// Checks per-field flags: key kinds, auto-generation and defaults.
pub(crate) fn check_field_flags(entity: &str, fields: &[FieldSpec]) -> Result<(), DeclarationError> {
    for field in fields {
        if field.is_key() && !field.kind.is_scalar_key() {
            return Err(DeclarationError::InvalidKeyKind {
                entity: entity.to_string(),
                field: field.name.clone(),
                kind: field.kind.name(),
            });
        }
        if field.auto_generate && field.kind != ValueKind::String {
            return Err(DeclarationError::AutoGenerateRequiresString {
                entity: entity.to_string(),
                field: field.name.clone(),
            });
        }
        if let Some(default) = &field.default {
            field
                .validate(default)
                .map_err(|source| DeclarationError::InvalidDefault {
                    entity: entity.to_string(),
                    field: field.name.clone(),
                    source,
                })?;
        }
    }
    Ok(())
}

/// Checks that a key template fits the declared fields.
///
/// Every placeholder must name a declared field and the hash key must be a
/// string field, since the rendered key is text.
pub(crate) fn check_template(
    entity: &str,
    template: &KeyTemplate,
    fields: &[FieldSpec],
    index: &HashMap<String, usize>,
    hash: usize,
) -> Result<(), DeclarationError> {
    let hash_field = &fields[hash];
    if hash_field.kind != ValueKind::String {
        return Err(DeclarationError::TemplateRequiresStringKey {
            entity: entity.to_string(),
            field: hash_field.name.clone(),
        });
    }
    for placeholder in template.placeholders() {
        match index.get(placeholder) {
            None => {
                return Err(DeclarationError::UnknownPlaceholder {
                    entity: entity.to_string(),
                    placeholder: placeholder.clone(),
                })
            }
            Some(&pos) if pos == hash => {
                return Err(DeclarationError::MalformedTemplate {
                    template: template.source().to_string(),
                    reason: format!("placeholder '{placeholder}' is the hash key itself"),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
