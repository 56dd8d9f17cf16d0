//! Save engine: write intents, the single write routine, and set deltas.

use std::cell::OnceCell;
use std::time::Instant;

use super::entity::Entity;
use super::pending::PendingOp;
use crate::error::{ModelError, Result};
use crate::store::{AttributeUpdate, Store, StoreError};
use crate::types::{AttributeValue, Item, PrimaryKey, ValidationError, Value};

/// Attribute changes of a partial write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    pub key: Option<PrimaryKey>,
    /// Attributes to overwrite
    pub sets: Vec<(String, AttributeValue)>,
    /// Attributes to remove
    pub deletes: Vec<String>,
    /// Set members to add
    pub adds: Vec<(String, AttributeValue)>,
    /// Set members to remove
    pub removes: Vec<(String, AttributeValue)>,
}

impl Patch {
    pub fn new(key: PrimaryKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.deletes.is_empty()
            && self.adds.is_empty()
            && self.removes.is_empty()
    }

    /// Update verbs in a stable order: puts, deletes, adds, removals.
    pub fn to_updates(&self) -> Vec<AttributeUpdate> {
        let puts = self.sets.iter().map(|(name, value)| AttributeUpdate::Put {
            name: name.clone(),
            value: value.clone(),
        });
        let deletes = self
            .deletes
            .iter()
            .map(|name| AttributeUpdate::Delete { name: name.clone() });
        let adds = self.adds.iter().map(|(name, value)| AttributeUpdate::Add {
            name: name.clone(),
            value: value.clone(),
        });
        let removes = self
            .removes
            .iter()
            .map(|(name, value)| AttributeUpdate::DeleteFromSet {
                name: name.clone(),
                value: value.clone(),
            });
        puts.chain(deletes).chain(adds).chain(removes).collect()
    }
}

/// How a save reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteIntent {
    /// Write the whole record
    FullReplace(Item),
    /// Send only the changed attributes
    IncrementalPatch(Patch),
}

impl WriteIntent {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::FullReplace(_) => "put",
            Self::IncrementalPatch(_) => "update",
        }
    }
}

/// Executes a write intent against a table.
///
/// # Arguments
/// * `store` - Backing store
/// * `table` - Full table name
/// * `intent` - Write to perform
///
/// # Returns
/// `Ok(())` once the store acknowledged the write. An empty patch makes no
/// call.
pub fn apply_write(store: &dyn Store, table: &str, intent: &WriteIntent) -> Result<(), StoreError> {
    match intent {
        WriteIntent::FullReplace(item) => store.put_item(table, item.clone()),
        WriteIntent::IncrementalPatch(patch) => {
            let Some(key) = &patch.key else {
                return Err(StoreError::InvalidRequest("patch without key".to_string()));
            };
            let updates = patch.to_updates();
            if updates.is_empty() {
                return Ok(());
            }
            store.update_item(table, key, &updates)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Add,
    Remove,
}

impl SetOp {
    fn verb(self) -> &'static str {
        match self {
            Self::Add => "add to set",
            Self::Remove => "remove from set",
        }
    }
}

/// Applies a set delta to a stored set value. `None` means the set is empty.
fn apply_delta(
    current: Option<&AttributeValue>,
    delta: &AttributeValue,
    op: SetOp,
) -> Option<AttributeValue> {
    let merged = match (current, delta, op) {
        (None, delta, SetOp::Add) => delta.clone(),
        (None, _, SetOp::Remove) => return None,
        (Some(AttributeValue::Ss(cur)), AttributeValue::Ss(d), SetOp::Add) => {
            AttributeValue::Ss(cur.union(d).cloned().collect())
        }
        (Some(AttributeValue::Ns(cur)), AttributeValue::Ns(d), SetOp::Add) => {
            AttributeValue::Ns(cur.union(d).cloned().collect())
        }
        (Some(AttributeValue::Ss(cur)), AttributeValue::Ss(d), SetOp::Remove) => {
            AttributeValue::Ss(cur.difference(d).cloned().collect())
        }
        (Some(AttributeValue::Ns(cur)), AttributeValue::Ns(d), SetOp::Remove) => {
            AttributeValue::Ns(cur.difference(d).cloned().collect())
        }
        (Some(other), _, _) => other.clone(),
    };
    let empty = matches!(&merged, AttributeValue::Ss(set) | AttributeValue::Ns(set) if set.is_empty());
    (!empty).then_some(merged)
}

impl Entity {
    /// Decides how the next save writes.
    ///
    /// New entities and `force_put` use a full put; stored entities send
    /// their pending field operations.
    pub fn write_intent(&self, force_put: bool) -> Result<WriteIntent> {
        let key = self.key()?;
        if !self.exists || force_put {
            return Ok(WriteIntent::FullReplace(self.raw.clone()));
        }

        let mut patch = Patch::new(key);
        for (field, op) in self.schema().fields().iter().zip(&self.pending) {
            let name = field.name.clone();
            match op {
                PendingOp::None => {}
                PendingOp::Replace(value) => patch.sets.push((name, value.clone())),
                PendingOp::Delete => patch.deletes.push(name),
                PendingOp::Add(delta) => patch.adds.push((name, delta.clone())),
                PendingOp::Remove(delta) => patch.removes.push((name, delta.clone())),
            }
        }
        Ok(WriteIntent::IncrementalPatch(patch))
    }

    /// Saves pending changes; does nothing when the entity is clean.
    pub fn save(&mut self) -> Result<()> {
        self.save_with(false)
    }

    /// Saves pending changes, optionally forcing a full put.
    ///
    /// On failure the entity keeps its dirty state so the save can be
    /// retried.
    pub fn save_with(&mut self, force_put: bool) -> Result<()> {
        if !self.dirty {
            tracing::debug!(entity = %self.schema().name(), "Save skipped, entity is clean");
            return Ok(());
        }

        let started = Instant::now();
        let intent = self.write_intent(force_put)?;
        let table = self.model.table_name();
        apply_write(self.model.connection().store(), &table, &intent)?;
        self.mark_saved();

        tracing::info!(
            entity = %self.schema().name(),
            table = %table,
            mode = intent.mode(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Saved entity"
        );
        Ok(())
    }

    /// Deletes the record with this entity's key from the store.
    ///
    /// Succeeds whether or not a record existed and returns `true` if one
    /// was removed. The entity stays usable; saving it again writes a full
    /// record.
    pub fn delete(&mut self) -> Result<bool> {
        let key = self.key()?;
        let table = self.model.table_name();
        let removed = self.model.connection().store().delete_item(&table, &key)?;
        self.exists = false;
        self.dirty = true;
        self.pending.iter_mut().for_each(|op| *op = PendingOp::None);
        tracing::info!(entity = %self.schema().name(), key = %key, removed, "Deleted entity");
        Ok(removed)
    }

    /// Adds members to a set field and writes only that delta.
    ///
    /// Refuses to run while other changes are pending unless `force` is
    /// set, in which case they are written in the same partial update.
    pub fn add_to_set(&mut self, name: &str, items: impl Into<Value>, force: bool) -> Result<()> {
        self.write_set_delta(name, items.into(), SetOp::Add, force)
    }

    /// Removes members from a set field and writes only that delta.
    pub fn remove_from_set(
        &mut self,
        name: &str,
        items: impl Into<Value>,
        force: bool,
    ) -> Result<()> {
        self.write_set_delta(name, items.into(), SetOp::Remove, force)
    }

    /// Records a set addition for the next save.
    pub fn stage_add_to_set(&mut self, name: &str, items: impl Into<Value>) -> Result<()> {
        self.stage_set_delta(name, items.into(), SetOp::Add)
            .map(|_| ())
    }

    /// Records a set removal for the next save.
    pub fn stage_remove_from_set(&mut self, name: &str, items: impl Into<Value>) -> Result<()> {
        self.stage_set_delta(name, items.into(), SetOp::Remove)
            .map(|_| ())
    }

    fn write_set_delta(&mut self, name: &str, items: Value, op: SetOp, force: bool) -> Result<()> {
        let (index, _) = self.field(name)?;
        if !self.exists {
            return Err(self.not_persisted());
        }
        let pending = self.pending_fields();
        if !pending.is_empty() && !force {
            return Err(ModelError::PendingChanges {
                entity: self.schema().name().to_string(),
                fields: pending,
            });
        }

        let saved_raw = self.raw.get(name).cloned();
        let saved_op = self.pending[index].clone();
        let saved_dirty = self.dirty;

        if !self.stage_set_delta(name, items, op)? {
            return Ok(());
        }
        if let Err(e) = self.save_with(false) {
            match saved_raw {
                Some(value) => self.raw.insert(name.to_string(), value),
                None => self.raw.remove(name),
            };
            self.cache[index] = OnceCell::new();
            self.pending[index] = saved_op;
            self.dirty = saved_dirty;
            return Err(e);
        }
        Ok(())
    }

    /// Stages a set delta. Returns `false` when the delta is empty.
    fn stage_set_delta(&mut self, name: &str, items: Value, op: SetOp) -> Result<bool> {
        let (index, field) = self.field(name)?;
        if !field.kind.is_set() {
            return Err(ValidationError::TypeMismatch {
                field: name.to_string(),
                expected: "set field",
                found: field.kind.name(),
            }
            .into());
        }
        if !self.exists {
            return Err(self.not_persisted());
        }
        field.validate(&items)?;
        let Some(delta) = field.from_native(&items) else {
            return Ok(false);
        };

        let entity = self.schema().name().to_string();
        let recorded = match op {
            SetOp::Add => self.pending[index].record_add(delta.clone()),
            SetOp::Remove => self.pending[index].record_remove(delta.clone()),
        };
        recorded.map_err(|pending| ModelError::ConflictingFieldOperation {
            entity,
            field: name.to_string(),
            pending,
            requested: op.verb(),
        })?;

        match apply_delta(self.raw.get(name), &delta, op) {
            Some(value) => self.raw.insert(name.to_string(), value),
            None => self.raw.remove(name),
        };
        self.cache[index] = OnceCell::new();
        self.dirty = true;
        Ok(true)
    }

    fn not_persisted(&self) -> ModelError {
        ModelError::NotPersisted {
            entity: self.schema().name().to_string(),
        }
    }
}
