//! Connection handle and the optional process-wide connection.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::Store;
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};

static GLOBAL: OnceLock<Connection> = OnceLock::new();

/// Store plus configuration, cheap to clone.
#[derive(Clone)]
pub struct Connection {
    store: Arc<dyn Store>,
    config: Arc<ModelConfig>,
}

impl Connection {
    /// Creates a connection with the default configuration.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, ModelConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, config: ModelConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Full table name with the configured prefix.
    pub fn table_name(&self, table: &str) -> String {
        self.config.table_name(table)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Installs the process-wide connection. Fails if one is already installed.
pub fn install_global(connection: Connection) -> Result<()> {
    GLOBAL
        .set(connection)
        .map_err(|_| ModelError::Connection("global connection already installed".to_string()))
}

/// Returns the process-wide connection.
pub fn global() -> Result<&'static Connection> {
    GLOBAL
        .get()
        .ok_or_else(|| ModelError::Connection("global connection not installed".to_string()))
}

/// Returns the process-wide connection, creating it with `init` on first use.
///
/// `init` runs at most once even under concurrent first calls.
pub fn global_or_init<F>(init: F) -> &'static Connection
where
    F: FnOnce() -> Connection,
{
    GLOBAL.get_or_init(init)
}
