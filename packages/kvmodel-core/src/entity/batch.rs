//! Batched multi-key retrieval.
//!
//! Keys are de-duplicated and sent in chunks no larger than the store's
//! per-request cap. Keys the store reports as unprocessed are resent after
//! an exponential backoff until none remain or the retry budget runs out.
//! Results are then laid back out in the caller's key order.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::entity::Entity;
use super::model::Model;
use crate::error::{ModelError, Result};
use crate::key::KeyInput;
use crate::store::{BatchGetOutput, Deadline, RetryPolicy, Store, StoreError};
use crate::types::{Item, PrimaryKey};

/// Records fetched by [`fetch_batch`] plus pass statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFetch {
    /// Every record found, in no particular order
    pub items: Vec<Item>,
    /// Round trips made over the key set, first pass included
    pub passes: u32,
    /// Store calls made
    pub calls: usize,
    /// Read capacity reported by the store
    pub consumed_capacity: f64,
}

/// Parameters of one batch fetch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Keys per store call
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub deadline: Deadline,
}

/// Sends one pass of chunks and merges the results.
fn run_pass(store: &dyn Store, table: &str, chunks: &[&[PrimaryKey]]) -> Result<Vec<BatchGetOutput>, StoreError> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        chunks
            .par_iter()
            .map(|chunk| store.batch_get_item(table, chunk))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        chunks
            .iter()
            .map(|chunk| store.batch_get_item(table, chunk))
            .collect()
    }
}

/// Fetches every key, retrying unprocessed keys with backoff.
///
/// # Arguments
/// * `store` - Backing store
/// * `table` - Full table name
/// * `keys` - Distinct keys to fetch
/// * `options` - Chunk size, retry policy and deadline
///
/// # Returns
/// All records found, or `UnprocessedKeys` once the retry budget is spent.
/// Store errors are returned as they are, without retry.
pub fn fetch_batch(
    store: &dyn Store,
    table: &str,
    keys: &[PrimaryKey],
    options: &BatchOptions,
) -> Result<BatchFetch> {
    let mut fetch = BatchFetch::default();
    let mut pending: Vec<PrimaryKey> = keys.to_vec();
    let chunk_size = options.chunk_size.max(1);
    let mut retries = 0u32;

    while !pending.is_empty() {
        options.deadline.check("batch get")?;
        let chunks: Vec<&[PrimaryKey]> = pending.chunks(chunk_size).collect();
        let outputs = run_pass(store, table, &chunks)?;
        fetch.passes += 1;
        fetch.calls += chunks.len();

        let mut unprocessed = Vec::new();
        for output in outputs {
            fetch.consumed_capacity += output.consumed_capacity;
            fetch.items.extend(output.items);
            unprocessed.extend(output.unprocessed);
        }
        tracing::debug!(
            table = %table,
            pass = fetch.passes,
            requested = pending.len(),
            unprocessed = unprocessed.len(),
            "Batch get pass finished"
        );

        if unprocessed.is_empty() {
            break;
        }
        if retries >= options.retry.max_retries {
            return Err(ModelError::UnprocessedKeys {
                table: table.to_string(),
                remaining: unprocessed.len(),
                attempts: fetch.passes,
            });
        }

        let delay = options.retry.delay_for(retries);
        retries += 1;
        tracing::warn!(
            table = %table,
            remaining = unprocessed.len(),
            attempt = retries,
            max_retries = options.retry.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying unprocessed batch keys"
        );
        options.deadline.sleep(delay, "batch get")?;
        pending = unprocessed;
    }

    Ok(fetch)
}

/// Removes repeated keys, keeping first occurrences in order.
fn distinct(keys: &[PrimaryKey]) -> Vec<PrimaryKey> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .filter(|key| seen.insert(*key))
        .cloned()
        .collect()
}

impl Model {
    /// Options for a batch fetch from this model's configuration.
    pub fn batch_options(&self) -> BatchOptions {
        let config = self.connection().config();
        BatchOptions {
            chunk_size: config.batch_get_limit,
            retry: RetryPolicy::from_config(config),
            deadline: Deadline::from_config(config),
        }
    }

    /// Loads many entities in as few round trips as the store allows.
    ///
    /// The result has one slot per input key, in input order; keys with no
    /// stored record give `None`. Repeated keys each get their own copy.
    pub fn get_many<I, K>(&self, keys: I) -> Result<Vec<Option<Entity>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyInput>,
    {
        self.get_many_with(keys, &self.batch_options())
    }

    /// [`get_many`](Self::get_many) with explicit batch options.
    pub fn get_many_with<I, K>(&self, keys: I, options: &BatchOptions) -> Result<Vec<Option<Entity>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyInput>,
    {
        let keys: Vec<PrimaryKey> = keys
            .into_iter()
            .map(|k| self.prepare_primary_key(k))
            .collect::<Result<_>>()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let table = self.table_name();
        let unique = distinct(&keys);
        let fetch = fetch_batch(self.connection().store(), &table, &unique, options)?;

        let schema = self.schema();
        let hash_name = schema.hash_key().name.as_str();
        let range_name = schema.range_key().map(|f| f.name.as_str());
        let found = fetch.items.len();
        let mut by_key: HashMap<PrimaryKey, Item> = fetch
            .items
            .into_iter()
            .filter_map(|item| {
                PrimaryKey::from_item(&item, hash_name, range_name).map(|key| (key, item))
            })
            .collect();

        let mut remaining: HashMap<&PrimaryKey, usize> = HashMap::new();
        for key in &keys {
            *remaining.entry(key).or_default() += 1;
        }
        let entities = keys
            .iter()
            .map(|key| {
                let count = remaining.get_mut(key)?;
                *count -= 1;
                let item = if *count == 0 {
                    by_key.remove(key)?
                } else {
                    by_key.get(key)?.clone()
                };
                Some(Entity::loaded(self.clone(), item))
            })
            .collect();

        tracing::info!(
            entity = %schema.name(),
            table = %table,
            keys = keys.len(),
            distinct = unique.len(),
            found,
            passes = fetch.passes,
            calls = fetch.calls,
            consumed_capacity = fetch.consumed_capacity,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch get finished"
        );
        Ok(entities)
    }

    /// Loads many entities and builds unsaved ones for keys with no record.
    ///
    /// Each input is used both as the key and, when nothing is stored, as
    /// the attributes of the new entity. Nothing is written.
    pub fn get_or_create_many<I, K>(&self, records: I) -> Result<Vec<Entity>>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyInput>,
    {
        let records: Vec<KeyInput> = records.into_iter().map(Into::into).collect();
        let loaded = self.get_many(records.iter().cloned())?;
        records
            .into_iter()
            .zip(loaded)
            .map(|(record, entity)| match entity {
                Some(entity) => Ok(entity),
                None => self.create(record),
            })
            .collect()
    }
}
