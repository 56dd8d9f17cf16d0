//! In-memory store with batch throttling and table transitions.
//!
//! Behaves like a partitioned key-value service closely enough for tests and
//! the demo tool: batch reads are capped at [`MAX_BATCH_GET_KEYS`] and can be
//! throttled to return unprocessed keys, and table creation and deletion
//! take a configurable number of status polls to settle.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{
    AttributeUpdate, BatchGetOutput, Store, StoreError, TableDefinition, TableDescription,
    TableStatus, MAX_BATCH_GET_KEYS,
};
use crate::types::{AttributeValue, Item, Number, PrimaryKey};

/// Read capacity charged per record returned by a batch read.
const READ_UNIT_PER_ITEM: f64 = 0.5;

#[derive(Debug)]
struct MemTable {
    definition: TableDefinition,
    status: TableStatus,
    /// Status polls left before the current transition completes
    polls_left: u32,
    items: HashMap<PrimaryKey, Item>,
}

impl MemTable {
    fn key_of(&self, item: &Item) -> Result<PrimaryKey, StoreError> {
        let range_name = self.definition.range_key.as_ref().map(|k| k.name.as_str());
        PrimaryKey::from_item(item, &self.definition.hash_key.name, range_name).ok_or_else(|| {
            StoreError::InvalidRequest(format!(
                "item lacks key attributes of table '{}'",
                self.definition.name
            ))
        })
    }

    fn check_key_shape(&self, key: &PrimaryKey) -> Result<(), StoreError> {
        if key.range.is_some() != self.definition.range_key.is_some() {
            return Err(StoreError::InvalidRequest(format!(
                "key {} does not match the key schema of table '{}'",
                key, self.definition.name
            )));
        }
        Ok(())
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        self.definition.hash_key.name == name
            || self
                .definition
                .range_key
                .as_ref()
                .is_some_and(|k| k.name == name)
    }
}

/// Call counters, readable while the store is in use.
#[derive(Debug, Default)]
pub struct StoreStats {
    get_item: AtomicU64,
    put_item: AtomicU64,
    update_item: AtomicU64,
    delete_item: AtomicU64,
    batch_get_item: AtomicU64,
    batch_keys_requested: AtomicU64,
    unprocessed_returned: AtomicU64,
    describe_table: AtomicU64,
}

impl StoreStats {
    pub fn get_item_calls(&self) -> u64 {
        self.get_item.load(Ordering::Relaxed)
    }

    pub fn put_item_calls(&self) -> u64 {
        self.put_item.load(Ordering::Relaxed)
    }

    pub fn update_item_calls(&self) -> u64 {
        self.update_item.load(Ordering::Relaxed)
    }

    pub fn delete_item_calls(&self) -> u64 {
        self.delete_item.load(Ordering::Relaxed)
    }

    pub fn batch_get_calls(&self) -> u64 {
        self.batch_get_item.load(Ordering::Relaxed)
    }

    /// Keys sent across all batch reads, retries included.
    pub fn batch_keys_requested(&self) -> u64 {
        self.batch_keys_requested.load(Ordering::Relaxed)
    }

    /// Keys handed back as unprocessed across all batch reads.
    pub fn unprocessed_returned(&self) -> u64 {
        self.unprocessed_returned.load(Ordering::Relaxed)
    }

    pub fn describe_table_calls(&self) -> u64 {
        self.describe_table.load(Ordering::Relaxed)
    }

    /// Put, update and delete calls together.
    pub fn write_calls(&self) -> u64 {
        self.put_item_calls() + self.update_item_calls() + self.delete_item_calls()
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Reference [`Store`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
    /// Keys serviced per batch read; the rest come back unprocessed
    batch_capacity: Option<usize>,
    /// Status polls a table transition takes
    transition_polls: u32,
    stats: StoreStats,
    update_log: Mutex<Vec<(String, Vec<AttributeUpdate>)>>,
}

impl MemoryStore {
    /// Creates an empty store with no throttling and instant transitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits every batch read to servicing `capacity` keys.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = Some(capacity);
        self
    }

    /// Makes table creation and deletion take `polls` status polls.
    pub fn with_transition_polls(mut self, polls: u32) -> Self {
        self.transition_polls = polls;
        self
    }

    /// Creates an active table immediately, bypassing transitions.
    pub fn create_active_table(&self, definition: TableDefinition) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&definition.name) {
            return Err(StoreError::TableAlreadyExists(definition.name));
        }
        tables.insert(
            definition.name.clone(),
            MemTable {
                definition,
                status: TableStatus::Active,
                polls_left: 0,
                items: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Update verbs received so far, per call, with the table name.
    pub fn update_log(&self) -> Vec<(String, Vec<AttributeUpdate>)> {
        self.update_log.lock().clone()
    }

    /// Number of records in a table, or `None` if it does not exist.
    pub fn item_count(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(|t| t.items.len())
    }

    /// Runs `f` against an active table.
    fn with_active<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MemTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tables = self.tables.read();
        let entry = Self::active(table, tables.get(table))?;
        f(entry)
    }

    /// Runs `f` against an active table with write access.
    fn with_active_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.write();
        Self::active(table, tables.get(table))?;
        match tables.get_mut(table) {
            Some(entry) => f(entry),
            None => Err(StoreError::TableNotFound {
                table: table.to_string(),
            }),
        }
    }

    fn active<'a>(table: &str, entry: Option<&'a MemTable>) -> Result<&'a MemTable, StoreError> {
        match entry {
            None => Err(StoreError::TableNotFound {
                table: table.to_string(),
            }),
            Some(t) if t.status == TableStatus::Active => Ok(t),
            Some(_) => Err(StoreError::TableNotActive {
                table: table.to_string(),
            }),
        }
    }
}

/// Applies one update verb to a record.
fn apply_update(item: &mut Item, update: &AttributeUpdate) -> Result<(), StoreError> {
    match update {
        AttributeUpdate::Put { name, value } => {
            item.insert(name.clone(), value.clone());
        }
        AttributeUpdate::Delete { name } => {
            item.remove(name);
        }
        AttributeUpdate::Add { name, value } => {
            let merged = match (item.remove(name), value) {
                (None, value) => value.clone(),
                (Some(AttributeValue::Ss(mut current)), AttributeValue::Ss(delta)) => {
                    current.extend(delta.iter().cloned());
                    AttributeValue::Ss(current)
                }
                (Some(AttributeValue::Ns(current)), AttributeValue::Ns(delta)) => {
                    AttributeValue::Ns(union_numbers(&current, delta)?)
                }
                (Some(AttributeValue::N(current)), AttributeValue::N(delta)) => {
                    AttributeValue::N(add_numbers(&current, delta)?)
                }
                (Some(current), value) => {
                    let message = format!(
                        "cannot ADD {} to {} attribute '{}'",
                        value.type_tag(),
                        current.type_tag(),
                        name
                    );
                    item.insert(name.clone(), current);
                    return Err(StoreError::InvalidRequest(message));
                }
            };
            item.insert(name.clone(), merged);
        }
        AttributeUpdate::DeleteFromSet { name, value } => {
            let remaining = match (item.remove(name), value) {
                (None, _) => None,
                (Some(AttributeValue::Ss(mut current)), AttributeValue::Ss(delta)) => {
                    current.retain(|s| !delta.contains(s));
                    (!current.is_empty()).then_some(AttributeValue::Ss(current))
                }
                (Some(AttributeValue::Ns(current)), AttributeValue::Ns(delta)) => {
                    let delta = parse_numbers(delta)?;
                    let kept: BTreeSet<String> = current
                        .into_iter()
                        .filter(|n| Number::parse(n).map_or(true, |n| !delta.contains(&n)))
                        .collect();
                    (!kept.is_empty()).then_some(AttributeValue::Ns(kept))
                }
                (Some(current), value) => {
                    let message = format!(
                        "cannot DELETE {} from {} attribute '{}'",
                        value.type_tag(),
                        current.type_tag(),
                        name
                    );
                    item.insert(name.clone(), current);
                    return Err(StoreError::InvalidRequest(message));
                }
            };
            if let Some(value) = remaining {
                item.insert(name.clone(), value);
            }
        }
    }
    Ok(())
}

fn parse_numbers(set: &BTreeSet<String>) -> Result<BTreeSet<Number>, StoreError> {
    set.iter()
        .map(|n| {
            Number::parse(n).ok_or_else(|| StoreError::InvalidRequest(format!("bad number {n:?}")))
        })
        .collect()
}

fn union_numbers(
    current: &BTreeSet<String>,
    delta: &BTreeSet<String>,
) -> Result<BTreeSet<String>, StoreError> {
    let mut numbers = parse_numbers(current)?;
    numbers.extend(parse_numbers(delta)?);
    Ok(numbers.iter().map(Number::to_string).collect())
}

fn add_numbers(current: &str, delta: &str) -> Result<String, StoreError> {
    let bad = || StoreError::InvalidRequest(format!("cannot add {delta:?} to {current:?}"));
    match (Number::parse(current), Number::parse(delta)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => {
            a.checked_add(b).map(|n| n.to_string()).ok_or_else(bad)
        }
        (Some(a), Some(b)) => Ok(Number::Float(a.as_f64() + b.as_f64()).to_string()),
        _ => Err(bad()),
    }
}

impl Store for MemoryStore {
    fn get_item(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>, StoreError> {
        StoreStats::bump(&self.stats.get_item, 1);
        self.with_active(table, |t| {
            t.check_key_shape(key)?;
            Ok(t.items.get(key).cloned())
        })
    }

    fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        StoreStats::bump(&self.stats.put_item, 1);
        self.with_active_mut(table, |t| {
            let key = t.key_of(&item)?;
            t.items.insert(key, item);
            Ok(())
        })
    }

    fn update_item(
        &self,
        table: &str,
        key: &PrimaryKey,
        updates: &[AttributeUpdate],
    ) -> Result<(), StoreError> {
        StoreStats::bump(&self.stats.update_item, 1);
        self.with_active_mut(table, |t| {
            t.check_key_shape(key)?;
            if let Some(update) = updates.iter().find(|u| t.is_key_attribute(u.name())) {
                return Err(StoreError::InvalidRequest(format!(
                    "cannot update key attribute '{}'",
                    update.name()
                )));
            }

            let mut item = match t.items.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let mut fresh = Item::new();
                    fresh.insert(t.definition.hash_key.name.clone(), key.hash.clone());
                    if let (Some(def), Some(range)) = (&t.definition.range_key, &key.range) {
                        fresh.insert(def.name.clone(), range.clone());
                    }
                    fresh
                }
            };
            for update in updates {
                apply_update(&mut item, update)?;
            }
            t.items.insert(key.clone(), item);
            Ok(())
        })?;
        self.update_log
            .lock()
            .push((table.to_string(), updates.to_vec()));
        Ok(())
    }

    fn delete_item(&self, table: &str, key: &PrimaryKey) -> Result<bool, StoreError> {
        StoreStats::bump(&self.stats.delete_item, 1);
        self.with_active_mut(table, |t| {
            t.check_key_shape(key)?;
            Ok(t.items.remove(key).is_some())
        })
    }

    fn batch_get_item(
        &self,
        table: &str,
        keys: &[PrimaryKey],
    ) -> Result<BatchGetOutput, StoreError> {
        StoreStats::bump(&self.stats.batch_get_item, 1);
        StoreStats::bump(&self.stats.batch_keys_requested, keys.len() as u64);

        if keys.is_empty() || keys.len() > MAX_BATCH_GET_KEYS {
            return Err(StoreError::InvalidRequest(format!(
                "batch read must carry 1 to {} keys, got {}",
                MAX_BATCH_GET_KEYS,
                keys.len()
            )));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(dup) = keys.iter().find(|k| !seen.insert(*k)) {
            return Err(StoreError::InvalidRequest(format!(
                "duplicate key {dup} in batch read"
            )));
        }

        let serviced = self.batch_capacity.unwrap_or(keys.len()).min(keys.len());
        let (now, later) = keys.split_at(serviced);

        let items = self.with_active(table, |t| {
            let mut items = Vec::with_capacity(now.len());
            for key in now {
                t.check_key_shape(key)?;
                if let Some(item) = t.items.get(key) {
                    items.push(item.clone());
                }
            }
            Ok(items)
        })?;

        StoreStats::bump(&self.stats.unprocessed_returned, later.len() as u64);
        Ok(BatchGetOutput {
            consumed_capacity: items.len() as f64 * READ_UNIT_PER_ITEM,
            items,
            unprocessed: later.to_vec(),
        })
    }

    fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&definition.name) {
            return Err(StoreError::TableAlreadyExists(definition.name.clone()));
        }
        let status = if self.transition_polls == 0 {
            TableStatus::Active
        } else {
            TableStatus::Creating
        };
        tables.insert(
            definition.name.clone(),
            MemTable {
                definition: definition.clone(),
                status,
                polls_left: self.transition_polls,
                items: HashMap::new(),
            },
        );
        tracing::debug!(table = %definition.name, ?status, "Memory store created table");
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let entry = tables.get_mut(table).ok_or_else(|| StoreError::TableNotFound {
            table: table.to_string(),
        })?;
        if entry.status != TableStatus::Active {
            return Err(StoreError::TableInUse {
                table: table.to_string(),
            });
        }
        if self.transition_polls == 0 {
            tables.remove(table);
        } else {
            entry.status = TableStatus::Deleting;
            entry.polls_left = self.transition_polls;
        }
        Ok(())
    }

    fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        StoreStats::bump(&self.stats.describe_table, 1);
        let mut tables = self.tables.write();
        let entry = tables.get_mut(table).ok_or_else(|| StoreError::TableNotFound {
            table: table.to_string(),
        })?;

        if entry.status != TableStatus::Active {
            entry.polls_left = entry.polls_left.saturating_sub(1);
            if entry.polls_left == 0 {
                match entry.status {
                    TableStatus::Creating => entry.status = TableStatus::Active,
                    _ => {
                        tables.remove(table);
                        return Err(StoreError::TableNotFound {
                            table: table.to_string(),
                        });
                    }
                }
            }
        }

        Ok(TableDescription {
            name: table.to_string(),
            status: entry.status,
            item_count: entry.items.len(),
        })
    }
}
