//! Registry of declared entity types.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::error::DeclarationError;
use super::schema::{AbstractSchema, EntitySchema, SchemaBuilder};

/// Rust type that declares an entity schema.
pub trait EntityDecl {
    /// Registry name of the entity type
    const NAME: &'static str;

    /// Returns the builder describing the entity. Called at most once per
    /// registry.
    fn declare() -> SchemaBuilder;
}

#[derive(Debug, Clone)]
enum Declared {
    Abstract(Arc<AbstractSchema>),
    Concrete(Arc<EntitySchema>),
}

/// Thread-safe cache of entity declarations keyed by entity name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, Declared>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    /// Registers a built concrete schema.
    ///
    /// # Arguments
    /// * `schema` - Schema to register under its entity name
    ///
    /// # Returns
    /// `Ok(())` on success, `Err(AlreadyRegistered)` if the name is taken.
    pub fn register(&self, schema: Arc<EntitySchema>) -> Result<(), DeclarationError> {
        self.insert(schema.name().to_string(), Declared::Concrete(schema))
    }

    /// Registers an abstract declaration and returns the shared handle.
    pub fn register_abstract(
        &self,
        schema: AbstractSchema,
    ) -> Result<Arc<AbstractSchema>, DeclarationError> {
        let schema = Arc::new(schema);
        self.insert(
            schema.name().to_string(),
            Declared::Abstract(Arc::clone(&schema)),
        )?;
        Ok(schema)
    }

    fn insert(&self, name: String, declared: Declared) -> Result<(), DeclarationError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(DeclarationError::AlreadyRegistered { entity: name });
        }
        tracing::debug!(entity = %name, "Registered entity declaration");
        entries.insert(name, declared);
        Ok(())
    }

    /// Looks up a concrete schema by entity name.
    pub fn get(&self, name: &str) -> Result<Arc<EntitySchema>, DeclarationError> {
        match self.entries.read().get(name) {
            Some(Declared::Concrete(schema)) => Ok(Arc::clone(schema)),
            Some(Declared::Abstract(_)) => Err(DeclarationError::AbstractEntity {
                entity: name.to_string(),
            }),
            None => Err(DeclarationError::UnknownEntity {
                entity: name.to_string(),
            }),
        }
    }

    /// Looks up an abstract declaration by name.
    pub fn get_abstract(&self, name: &str) -> Result<Arc<AbstractSchema>, DeclarationError> {
        match self.entries.read().get(name) {
            Some(Declared::Abstract(schema)) => Ok(Arc::clone(schema)),
            _ => Err(DeclarationError::UnknownEntity {
                entity: name.to_string(),
            }),
        }
    }

    /// Returns the schema of `T`, building and caching it on first use.
    ///
    /// The build runs under the write lock, so concurrent first calls
    /// observe one schema instance.
    pub fn schema_of<T: EntityDecl>(&self) -> Result<Arc<EntitySchema>, DeclarationError> {
        if let Some(declared) = self.entries.read().get(T::NAME) {
            return Self::concrete(T::NAME, declared);
        }

        let mut entries = self.entries.write();
        if let Some(declared) = entries.get(T::NAME) {
            return Self::concrete(T::NAME, declared);
        }
        let schema = T::declare().build()?;
        entries.insert(T::NAME.to_string(), Declared::Concrete(Arc::clone(&schema)));
        Ok(schema)
    }

    fn concrete(name: &str, declared: &Declared) -> Result<Arc<EntitySchema>, DeclarationError> {
        match declared {
            Declared::Concrete(schema) => Ok(Arc::clone(schema)),
            Declared::Abstract(_) => Err(DeclarationError::AbstractEntity {
                entity: name.to_string(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Names of all registered declarations.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}
