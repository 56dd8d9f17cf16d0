//! Persistent entity instance: raw record, decoded cache and dirty state.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use super::model::Model;
use super::pending::PendingOp;
use crate::error::{ModelError, Result};
use crate::key;
use crate::schema::{EntitySchema, FieldSpec};
use crate::types::{AttributeValue, Attributes, Item, PrimaryKey, Value};

/// One record of an entity type.
///
/// Holds the stored attribute map, a lazily decoded value per field, and
/// the `exists`/`dirty` flags that decide how [`save`](Entity::save) writes.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) model: Model,
    pub(crate) raw: Item,
    pub(crate) cache: Vec<OnceCell<Value>>,
    pub(crate) pending: Vec<PendingOp>,
    pub(crate) exists: bool,
    pub(crate) dirty: bool,
}

impl Entity {
    /// Entity built locally and not yet saved.
    pub(crate) fn unsaved(model: Model) -> Self {
        let fields = model.schema().fields().len();
        Self {
            model,
            raw: Item::new(),
            cache: vec![OnceCell::new(); fields],
            pending: vec![PendingOp::None; fields],
            exists: false,
            dirty: true,
        }
    }

    /// Entity read from the store.
    pub(crate) fn loaded(model: Model, raw: Item) -> Self {
        let fields = model.schema().fields().len();
        Self {
            model,
            raw,
            cache: vec![OnceCell::new(); fields],
            pending: vec![PendingOp::None; fields],
            exists: true,
            dirty: false,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn schema(&self) -> &EntitySchema {
        self.model.schema()
    }

    /// `true` once the record is known to be in the store.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// `true` when local changes have not been saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stored attribute map as it would be written by a full put.
    pub fn raw(&self) -> &Item {
        &self.raw
    }

    /// Names of fields with a pending partial-write operation.
    pub fn pending_fields(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .zip(&self.pending)
            .filter(|(_, op)| !op.is_none())
            .map(|(field, _)| field.name.clone())
            .collect()
    }

    /// Pending operation of a field.
    pub fn pending_op(&self, name: &str) -> Result<&PendingOp> {
        let (index, _) = self.field(name)?;
        Ok(&self.pending[index])
    }

    pub(crate) fn field(&self, name: &str) -> Result<(usize, &FieldSpec)> {
        let schema = self.schema();
        schema
            .field_index(name)
            .map(|i| (i, &schema.fields()[i]))
            .ok_or_else(|| ModelError::UnknownField {
                entity: schema.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Reads a field, decoding the stored attribute on first access.
    ///
    /// Absent attributes read as the field default, or the kind's empty
    /// value (`Null`, empty set, `[]` or `{}`).
    pub fn get(&self, name: &str) -> Result<&Value> {
        let (index, field) = self.field(name)?;
        let cell = &self.cache[index];
        if let Some(value) = cell.get() {
            return Ok(value);
        }
        let value = field
            .to_native(self.raw.get(name))
            .map_err(|source| ModelError::Decode {
                entity: self.schema().name().to_string(),
                field: name.to_string(),
                source,
            })?;
        Ok(cell.get_or_init(|| value))
    }

    /// Current hash key value.
    pub fn key_value(&self) -> Result<&Value> {
        let name = self.schema().hash_key().name.clone();
        self.get(&name)
    }

    /// Wire key of this entity.
    pub fn key(&self) -> Result<PrimaryKey> {
        let schema = self.schema();
        let range_name = schema.range_key().map(|f| f.name.as_str());
        PrimaryKey::from_item(&self.raw, &schema.hash_key().name, range_name).ok_or_else(|| {
            let mut missing = Vec::new();
            if !self.raw.contains_key(&schema.hash_key().name) {
                missing.push(schema.hash_key().name.clone());
            }
            if let Some(range) = range_name {
                if !self.raw.contains_key(range) {
                    missing.push(range.to_string());
                }
            }
            ModelError::MissingKeyComponents {
                entity: schema.name().to_string(),
                missing,
            }
        })
    }

    /// Decodes every field into an attribute map.
    pub fn to_attributes(&self) -> Result<Attributes> {
        let mut out = Attributes::new();
        for field in self.schema().fields() {
            out.insert(field.name.clone(), self.get(&field.name)?.clone());
        }
        Ok(out)
    }

    /// Assigns a field.
    ///
    /// The value is validated before anything changes. Assigning `Null`
    /// removes the attribute. Key fields of a stored entity cannot change;
    /// before the first save, changing a key template component re-derives
    /// the hash key.
    ///
    /// # Arguments
    /// * `name` - Field name
    /// * `value` - New value
    ///
    /// # Returns
    /// `Ok(())` if the value was accepted (or equal to the current one).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (index, field) = self.field(name)?;
        field.validate(&value)?;
        let encoded = field.from_native(&value);
        if encoded.as_ref() == self.raw.get(name) {
            return Ok(());
        }

        let schema = self.model.schema_arc();
        if self.exists && schema.is_key_field(index) {
            return Err(ModelError::KeyImmutable {
                entity: schema.name().to_string(),
                field: name.to_string(),
            });
        }

        // Some(None): the derived hash key no longer holds and is dropped.
        let derived_key = if !self.exists && schema.is_template_component(index) {
            match self.derive_hash_key(&schema, Some((index, &value)))? {
                Some(key) => Some(Some(key)),
                None if self.hash_key_is_derived(&schema)? => Some(None),
                None => None,
            }
        } else {
            None
        };

        self.pending[index]
            .record_assign(encoded.clone())
            .map_err(|pending| ModelError::ConflictingFieldOperation {
                entity: schema.name().to_string(),
                field: name.to_string(),
                pending,
                requested: "assign",
            })?;

        self.store_raw(index, name, encoded, value);
        let hash_index = schema.hash_key_index();
        let hash_name = schema.hash_key().name.clone();
        match derived_key {
            Some(Some(key)) => {
                self.pending[hash_index] = PendingOp::Replace(AttributeValue::S(key.clone()));
                self.store_raw(
                    hash_index,
                    &hash_name,
                    Some(AttributeValue::S(key.clone())),
                    Value::String(key),
                );
            }
            Some(None) => {
                self.pending[hash_index] = PendingOp::None;
                self.store_raw(hash_index, &hash_name, None, Value::Null);
            }
            None => {}
        }
        self.dirty = true;
        Ok(())
    }

    /// Removes a field's attribute; equivalent to assigning `Null`.
    pub fn delete_field(&mut self, name: &str) -> Result<()> {
        self.set(name, Value::Null)
    }

    /// Assigns several fields. Either every assignment applies or, on the
    /// first error, the entity is left exactly as it was.
    pub fn update(&mut self, attrs: Attributes) -> Result<()> {
        for (name, value) in &attrs {
            let (_, field) = self.field(name)?;
            field.validate(value)?;
        }
        let snapshot = (
            self.raw.clone(),
            self.cache.clone(),
            self.pending.clone(),
            self.dirty,
        );
        for (name, value) in attrs {
            if let Err(e) = self.set(&name, value) {
                (self.raw, self.cache, self.pending, self.dirty) = snapshot;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Writes a field's encoded value and cached decoded value.
    pub(crate) fn store_raw(
        &mut self,
        index: usize,
        name: &str,
        encoded: Option<AttributeValue>,
        value: Value,
    ) {
        match encoded {
            Some(encoded) => {
                self.raw.insert(name.to_string(), encoded);
                self.cache[index] = OnceCell::from(value);
            }
            None => {
                self.raw.remove(name);
                self.cache[index] = OnceCell::new();
            }
        }
    }

    /// Formats the templated hash key from the current components, with
    /// one component optionally replaced.
    ///
    /// Returns `Ok(None)` while any component is missing.
    fn derive_hash_key(
        &self,
        schema: &EntitySchema,
        replaced: Option<(usize, &Value)>,
    ) -> Result<Option<String>> {
        let Some(template) = schema.template() else {
            return Ok(None);
        };
        let mut components = BTreeMap::new();
        for placeholder in template.placeholders() {
            let current = match replaced {
                Some((index, value)) if schema.field_index(placeholder) == Some(index) => {
                    value.clone()
                }
                _ => self.get(placeholder)?.clone(),
            };
            components.insert(placeholder.clone(), current);
        }
        match key::compose_template(schema, |name| components.get(name)) {
            Ok(key) => Ok(Some(key)),
            Err(ModelError::MissingKeyComponents { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `true` when the stored hash key is the one the template produces
    /// from the current components. A key given directly is not derived.
    fn hash_key_is_derived(&self, schema: &EntitySchema) -> Result<bool> {
        let Some(key) = self.derive_hash_key(schema, None)? else {
            return Ok(false);
        };
        Ok(self.raw.get(&schema.hash_key().name) == Some(&AttributeValue::S(key)))
    }

    /// Marks the entity as saved.
    pub(crate) fn mark_saved(&mut self) {
        self.exists = true;
        self.dirty = false;
        self.pending.iter_mut().for_each(|op| *op = PendingOp::None);
    }
}
