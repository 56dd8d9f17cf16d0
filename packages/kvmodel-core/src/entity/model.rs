//! Typed handle for one entity type on one connection.

use std::sync::Arc;
use std::time::Instant;

use super::entity::Entity;
use crate::error::{ModelError, Result};
use crate::key::{self, KeyInput};
use crate::lexical_uuid::LexicalUuid;
use crate::schema::{EntityDecl, EntitySchema, SchemaRegistry};
use crate::store::Connection;
use crate::types::{Attributes, PrimaryKey, Value};

/// Entity type bound to a connection; entry point for loading and creating
/// entities.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<EntitySchema>,
    connection: Connection,
}

impl Model {
    pub fn new(schema: Arc<EntitySchema>, connection: Connection) -> Self {
        Self { schema, connection }
    }

    /// Model of a declared type, using the process-wide schema registry.
    pub fn of<T: EntityDecl>(connection: Connection) -> Result<Self> {
        let schema = SchemaRegistry::global().schema_of::<T>()?;
        Ok(Self::new(schema, connection))
    }

    /// Model of a registered entity by name.
    pub fn from_registry(
        registry: &SchemaRegistry,
        entity: &str,
        connection: Connection,
    ) -> Result<Self> {
        Ok(Self::new(registry.get(entity)?, connection))
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub(crate) fn schema_arc(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.schema)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Full table name, including the configured prefix.
    pub fn table_name(&self) -> String {
        self.connection.table_name(self.schema.table())
    }

    /// Canonical hash key for a key input.
    pub fn prepare_key(&self, input: impl Into<KeyInput>) -> Result<Value> {
        key::prepare_key(&self.schema, &input.into())
    }

    /// Wire key, including the range key when the entity has one.
    pub fn prepare_primary_key(&self, input: impl Into<KeyInput>) -> Result<PrimaryKey> {
        key::prepare_primary_key(&self.schema, &input.into())
    }

    /// Builds a new, unsaved entity.
    ///
    /// A scalar input is the hash key; a pair is hash and range key; an
    /// attribute map supplies every attribute, with the hash key taken
    /// from the map, derived from the key template, or generated when the
    /// hash key field is auto-generated.
    pub fn create(&self, input: impl Into<KeyInput>) -> Result<Entity> {
        self.create_with(input, Attributes::new())
    }

    /// Like [`create`](Self::create), with extra attributes.
    pub fn create_with(&self, input: impl Into<KeyInput>, extra: Attributes) -> Result<Entity> {
        let hash_field = self.schema.hash_key();
        let mut attrs = match input.into() {
            KeyInput::Scalar(hash) => {
                Attributes::from([(hash_field.name.clone(), hash)])
            }
            KeyInput::Pair(hash, range) => {
                let range_field = self.schema.range_key().ok_or_else(|| {
                    ModelError::InvalidKeyComponent {
                        entity: self.schema.name().to_string(),
                        field: hash_field.name.clone(),
                        reason: "entity declares no range key".to_string(),
                    }
                })?;
                Attributes::from([
                    (hash_field.name.clone(), hash),
                    (range_field.name.clone(), range),
                ])
            }
            KeyInput::Fields(map) => map,
        };
        attrs.extend(extra);

        let has_hash = attrs.get(&hash_field.name).is_some_and(|v| !v.is_null());
        if !has_hash && self.schema.template().is_none() && hash_field.auto_generate {
            attrs.insert(
                hash_field.name.clone(),
                Value::String(LexicalUuid::generate().guid()),
            );
        }

        let hash = key::prepare_key(&self.schema, &KeyInput::Fields(attrs.clone()))?;
        attrs.insert(hash_field.name.clone(), hash);
        key::prepare_primary_key(&self.schema, &KeyInput::Fields(attrs.clone()))?;

        let mut entity = Entity::unsaved(self.clone());
        for (name, value) in attrs {
            let (index, field) = entity.field(&name)?;
            field.validate(&value)?;
            let encoded = field.from_native(&value);
            entity.store_raw(index, &name, encoded, value);
        }
        Ok(entity)
    }

    /// Loads one entity.
    ///
    /// # Returns
    /// The loaded entity, or `ModelError::NotFound`.
    pub fn get(&self, input: impl Into<KeyInput>) -> Result<Entity> {
        let key = self.prepare_primary_key(input)?;
        self.load(&key)?.ok_or_else(|| ModelError::NotFound {
            entity: self.schema.name().to_string(),
            key: key.to_string(),
        })
    }

    /// Loads one entity, returning `None` when no record exists.
    pub fn find(&self, input: impl Into<KeyInput>) -> Result<Option<Entity>> {
        let key = self.prepare_primary_key(input)?;
        self.load(&key)
    }

    fn load(&self, key: &PrimaryKey) -> Result<Option<Entity>> {
        let started = Instant::now();
        let table = self.table_name();
        let item = self.connection.store().get_item(&table, key)?;
        tracing::info!(
            entity = %self.schema.name(),
            key = %key,
            found = item.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded entity"
        );
        Ok(item.map(|item| Entity::loaded(self.clone(), item)))
    }

    /// Loads an entity, or builds an unsaved one when none is stored.
    ///
    /// Never writes; the caller saves the result if it wants it stored.
    pub fn get_or_create(&self, input: impl Into<KeyInput>) -> Result<Entity> {
        let input = input.into();
        match self.find(input.clone())? {
            Some(entity) => Ok(entity),
            None => self.create(input),
        }
    }
}
