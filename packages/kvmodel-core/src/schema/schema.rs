//! Entity schema and its builder.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DeclarationError;
use super::field::FieldSpec;
use super::template::KeyTemplate;
use super::validation;

/// Provisioned throughput hint used when the table is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub read_units: u64,
    pub write_units: u64,
}

/// Resolved declaration of a concrete entity type.
///
/// Holds the ordered field list with a name lookup built once, the key
/// fields, and the optional composite key template.
#[derive(Debug)]
pub struct EntitySchema {
    name: String,
    table: String,
    capacity: Option<Capacity>,
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    hash_key: usize,
    range_key: Option<usize>,
    template: Option<KeyTemplate>,
    /// Positions of the hash key, range key and template components
    key_fields: Vec<usize>,
}

impl EntitySchema {
    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unprefixed table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared capacity, if any.
    pub fn capacity(&self) -> Option<Capacity> {
        self.capacity
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks a field up by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Position of a field in [`fields`](Self::fields).
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn hash_key(&self) -> &FieldSpec {
        &self.fields[self.hash_key]
    }

    pub fn hash_key_index(&self) -> usize {
        self.hash_key
    }

    pub fn range_key(&self) -> Option<&FieldSpec> {
        self.range_key.map(|i| &self.fields[i])
    }

    pub fn range_key_index(&self) -> Option<usize> {
        self.range_key
    }

    pub fn template(&self) -> Option<&KeyTemplate> {
        self.template.as_ref()
    }

    /// Returns `true` if the field takes part in the primary key, either
    /// directly or as a template component.
    pub fn is_key_field(&self, index: usize) -> bool {
        self.key_fields.contains(&index)
    }

    /// Returns `true` if the field is a component of the key template.
    pub fn is_template_component(&self, index: usize) -> bool {
        match &self.template {
            Some(template) => template
                .placeholders()
                .iter()
                .any(|p| self.index.get(p) == Some(&index)),
            None => false,
        }
    }
}

/// Field set shared by several concrete entity types.
///
/// Abstract declarations have no table and cannot be loaded or saved.
#[derive(Debug, Clone)]
pub struct AbstractSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl AbstractSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

/// Declares an entity type.
///
/// ```
/// use kvmodel_core::schema::{FieldSpec, SchemaBuilder};
/// use kvmodel_core::types::ValueKind;
///
/// let schema = SchemaBuilder::new("Membership")
///     .table("memberships")
///     .key_template("{org}:{user}")
///     .field(FieldSpec::new("id", ValueKind::String).hash_key())
///     .field(FieldSpec::new("org", ValueKind::String))
///     .field(FieldSpec::new("user", ValueKind::Integer))
///     .build()
///     .unwrap();
/// assert_eq!(schema.hash_key().name, "id");
/// ```
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    table: Option<String>,
    capacity: Option<Capacity>,
    template: Option<String>,
    inherited: Vec<FieldSpec>,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            capacity: None,
            template: None,
            inherited: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn capacity(mut self, read_units: u64, write_units: u64) -> Self {
        self.capacity = Some(Capacity {
            read_units,
            write_units,
        });
        self
    }

    pub fn key_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Pulls in the fields of an abstract declaration.
    ///
    /// Fields declared directly on this builder replace inherited fields of
    /// the same name.
    pub fn inherit(mut self, parent: &AbstractSchema) -> Self {
        self.inherited.extend(parent.fields.iter().cloned());
        self
    }

    /// Merges inherited and own fields, then checks the field list.
    fn resolve_fields(&self) -> Result<Vec<FieldSpec>, DeclarationError> {
        validation::index_fields(&self.name, &self.fields)?;

        let mut fields: Vec<FieldSpec> = Vec::with_capacity(self.inherited.len() + self.fields.len());
        for field in &self.inherited {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field.clone(),
                None => fields.push(field.clone()),
            }
        }
        for field in &self.fields {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field.clone(),
                None => fields.push(field.clone()),
            }
        }

        validation::check_field_flags(&self.name, &fields)?;
        Ok(fields)
    }

    /// Builds the schema of a concrete entity type.
    ///
    /// # Returns
    /// The shared schema, or the first declaration error found.
    pub fn build(self) -> Result<Arc<EntitySchema>, DeclarationError> {
        let fields = self.resolve_fields()?;
        let index = validation::index_fields(&self.name, &fields)?;
        let keys = validation::locate_keys(&self.name, &fields)?;
        let hash_key = keys.hash.ok_or_else(|| DeclarationError::MissingHashKey {
            entity: self.name.clone(),
        })?;

        let table = match self.table {
            Some(table) if !table.trim().is_empty() => table,
            _ => {
                return Err(DeclarationError::MissingTableName {
                    entity: self.name.clone(),
                })
            }
        };

        let template = match &self.template {
            Some(source) => {
                let template = KeyTemplate::parse(source)?;
                validation::check_template(&self.name, &template, &fields, &index, hash_key)?;
                Some(template)
            }
            None => None,
        };

        let mut key_fields = vec![hash_key];
        key_fields.extend(keys.range);
        if let Some(template) = &template {
            key_fields.extend(template.placeholders().iter().filter_map(|p| index.get(p)));
        }

        tracing::debug!(
            entity = %self.name,
            table = %table,
            fields = fields.len(),
            "Built entity schema"
        );

        Ok(Arc::new(EntitySchema {
            name: self.name,
            table,
            capacity: self.capacity,
            fields,
            index,
            hash_key,
            range_key: keys.range,
            template,
            key_fields,
        }))
    }

    /// Builds an abstract declaration that concrete builders can inherit.
    pub fn build_abstract(self) -> Result<AbstractSchema, DeclarationError> {
        let fields = self.resolve_fields()?;
        validation::locate_keys(&self.name, &fields)?;
        Ok(AbstractSchema {
            name: self.name,
            fields,
        })
    }
}
