//! Table lifecycle: create, drop and reset with bounded status polling.

use std::time::Duration;

use super::model::Model;
use crate::error::{ModelError, Result};
use crate::schema::Capacity;
use crate::store::{Deadline, KeyAttribute, StoreError, TableDefinition, TableStatus};

/// Table state a poll loop waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Active,
    Gone,
}

impl Model {
    /// Table definition derived from the schema and configuration.
    pub fn table_definition(&self) -> TableDefinition {
        let schema = self.schema();
        let config = self.connection().config();
        let capacity = schema.capacity().unwrap_or(Capacity {
            read_units: config.default_read_units,
            write_units: config.default_write_units,
        });
        TableDefinition {
            name: self.table_name(),
            hash_key: KeyAttribute {
                name: schema.hash_key().name.clone(),
                kind: schema.hash_key().kind,
            },
            range_key: schema.range_key().map(|f| KeyAttribute {
                name: f.name.clone(),
                kind: f.kind,
            }),
            read_units: capacity.read_units,
            write_units: capacity.write_units,
        }
    }

    /// Creates the entity's table, optionally waiting until it is active.
    pub fn create_table(&self, wait: bool) -> Result<()> {
        let definition = self.table_definition();
        self.connection().store().create_table(&definition)?;
        tracing::info!(
            table = %definition.name,
            read_units = definition.read_units,
            write_units = definition.write_units,
            "Creating table"
        );
        if wait {
            self.wait_for(Settled::Active)?;
        }
        Ok(())
    }

    /// Drops the entity's table, optionally waiting until it is gone.
    pub fn drop_table(&self, wait: bool) -> Result<()> {
        let table = self.table_name();
        self.connection().store().delete_table(&table)?;
        tracing::info!(table = %table, "Dropping table");
        if wait {
            self.wait_for(Settled::Gone)?;
        }
        Ok(())
    }

    /// Drops the table, waits for it to disappear, then creates it again.
    ///
    /// Does not wait for the new table to become active.
    pub fn reset_table(&self) -> Result<()> {
        self.drop_table(true)?;
        self.create_table(false)
    }

    /// Polls the table status until it settles or the poll bound is hit.
    fn wait_for(&self, target: Settled) -> Result<()> {
        let table = self.table_name();
        let config = self.connection().config();
        let interval = Duration::from_millis(config.table_poll_interval_ms);
        let deadline = Deadline::from_config(config);
        let store = self.connection().store();

        for attempt in 1..=config.table_poll_attempts {
            deadline.check("table administration")?;
            let settled = match (store.describe_table(&table), target) {
                (Ok(description), Settled::Active) => {
                    description.status == TableStatus::Active
                }
                (Ok(_), Settled::Gone) => false,
                (Err(StoreError::TableNotFound { .. }), Settled::Gone) => true,
                (Err(e), _) => return Err(e.into()),
            };
            tracing::debug!(table = %table, attempt, ?target, settled, "Polled table status");
            if settled {
                return Ok(());
            }
            if attempt < config.table_poll_attempts {
                deadline.sleep(interval, "table administration")?;
            }
        }

        Err(ModelError::AdminTimeout {
            table,
            attempts: config.table_poll_attempts,
        })
    }
}
