//! Mapping layer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::store::MAX_BATCH_GET_KEYS;

/// Configuration shared by every entity operation on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Prepended to every table name
    pub table_prefix: String,
    /// Keys per batch read call (1-100)
    pub batch_get_limit: usize,
    /// Retry passes for unprocessed batch keys
    pub batch_max_retries: u32,
    /// First backoff delay in milliseconds
    pub batch_retry_initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub batch_retry_max_delay_ms: u64,
    /// Per-operation deadline in milliseconds (none = unbounded)
    pub operation_timeout_ms: Option<u64>,
    /// Status polls before table administration gives up
    pub table_poll_attempts: u32,
    /// Delay between status polls in milliseconds
    pub table_poll_interval_ms: u64,
    /// Read capacity for tables whose entity declares none
    pub default_read_units: u64,
    /// Write capacity for tables whose entity declares none
    pub default_write_units: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            batch_get_limit: MAX_BATCH_GET_KEYS,
            batch_max_retries: 8,
            batch_retry_initial_delay_ms: 50,
            batch_retry_max_delay_ms: 2000,
            operation_timeout_ms: None,
            table_poll_attempts: 30,
            table_poll_interval_ms: 1000,
            default_read_units: 8,
            default_write_units: 8,
        }
    }
}

impl ModelConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Overlays `KVMODEL_*` environment variables.
    ///
    /// Recognised: `KVMODEL_TABLE_PREFIX`, `KVMODEL_BATCH_GET_LIMIT`,
    /// `KVMODEL_BATCH_MAX_RETRIES`, `KVMODEL_BATCH_RETRY_INITIAL_DELAY_MS`,
    /// `KVMODEL_BATCH_RETRY_MAX_DELAY_MS`, `KVMODEL_OPERATION_TIMEOUT_MS`,
    /// `KVMODEL_TABLE_POLL_ATTEMPTS`, `KVMODEL_TABLE_POLL_INTERVAL_MS`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from any name lookup; used by
    /// [`with_env_overrides`](Self::with_env_overrides).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse()
                .map_err(|e| ModelError::Config(format!("{name}={raw:?}: {e}")))
        }

        if let Some(prefix) = lookup("KVMODEL_TABLE_PREFIX") {
            self.table_prefix = prefix;
        }
        if let Some(raw) = lookup("KVMODEL_BATCH_GET_LIMIT") {
            self.batch_get_limit = parse("KVMODEL_BATCH_GET_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("KVMODEL_BATCH_MAX_RETRIES") {
            self.batch_max_retries = parse("KVMODEL_BATCH_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("KVMODEL_BATCH_RETRY_INITIAL_DELAY_MS") {
            self.batch_retry_initial_delay_ms = parse("KVMODEL_BATCH_RETRY_INITIAL_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("KVMODEL_BATCH_RETRY_MAX_DELAY_MS") {
            self.batch_retry_max_delay_ms = parse("KVMODEL_BATCH_RETRY_MAX_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("KVMODEL_OPERATION_TIMEOUT_MS") {
            self.operation_timeout_ms = Some(parse("KVMODEL_OPERATION_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("KVMODEL_TABLE_POLL_ATTEMPTS") {
            self.table_poll_attempts = parse("KVMODEL_TABLE_POLL_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("KVMODEL_TABLE_POLL_INTERVAL_MS") {
            self.table_poll_interval_ms = parse("KVMODEL_TABLE_POLL_INTERVAL_MS", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.batch_get_limit == 0 || self.batch_get_limit > MAX_BATCH_GET_KEYS {
            return Err(ModelError::Config(format!(
                "batch_get_limit must be between 1 and {}, got {}",
                MAX_BATCH_GET_KEYS, self.batch_get_limit
            )));
        }
        if self.batch_retry_initial_delay_ms > self.batch_retry_max_delay_ms {
            return Err(ModelError::Config(
                "batch_retry_initial_delay_ms exceeds batch_retry_max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Full table name for an entity table.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }
}
