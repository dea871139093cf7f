use rusqlite::{OptionalExtension, params};
use tracing::{debug, error, info, warn};

use crate::error::SqliteHandleError;
use crate::statements::StatementSlot;

use super::SqliteLock;

pub(crate) const CONFIG_TABLE: &str = "config";

const CONFIG_TABLE_DDL: &str = "
    CREATE TABLE config (id INTEGER PRIMARY KEY, keyname TEXT, value TEXT);
    CREATE INDEX config_index1 ON config (keyname);
";

impl SqliteLock<'_> {
    /// Create the `config` table unless it already exists.
    ///
    /// # Errors
    /// Returns `SqliteHandleError` if the schema cannot be read or created.
    pub fn ensure_config_table(&mut self) -> Result<(), SqliteHandleError> {
        if self.table_exists(CONFIG_TABLE)? {
            return Ok(());
        }
        info!(owner = %self.owner(), "creating config table");
        self.execute(CONFIG_TABLE_DDL)
    }

    /// Store `value` under `key`, updating the existing row if there is one.
    ///
    /// # Errors
    /// Returns `SqliteHandleError` if the lookup, update, or insert fails.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SqliteHandleError> {
        let owner = self.owner();
        let exists = self
            .builtin(StatementSlot::SelectConfigValue)?
            .exists([key])
            .map_err(|source| {
                config_failure(owner, key, StatementSlot::SelectConfigValue, source)
            })?;

        let slot = if exists {
            StatementSlot::UpdateConfig
        } else {
            StatementSlot::InsertConfig
        };
        self.builtin(slot)?
            .execute(params![key, value])
            .map_err(|source| config_failure(owner, key, slot, source))?;
        debug!(owner = %owner, key, updated = exists, "config value stored");
        Ok(())
    }

    /// # Errors
    /// Same as [`SqliteLock::set`].
    pub fn set_int(&mut self, key: &str, value: i32) -> Result<(), SqliteHandleError> {
        self.set(key, &value.to_string())
    }

    /// Value stored under `key`, or `default` when the key is absent or the
    /// lookup fails.
    pub fn get(&mut self, key: &str, default: &str) -> String {
        self.lookup(key)
            .unwrap_or_default()
            .unwrap_or_else(|| default.to_owned())
    }

    /// Integer stored under `key`, or `default` when the key is absent, the
    /// lookup fails, or the stored text is not an integer.
    pub fn get_int(&mut self, key: &str, default: i32) -> i32 {
        let Some(text) = self.lookup(key).unwrap_or_default() else {
            return default;
        };
        text.trim().parse().unwrap_or_else(|_| {
            warn!(owner = %self.owner(), key, value = %text, "config value is not an integer");
            default
        })
    }

    /// Remove `key`. Returns whether a row was deleted.
    ///
    /// # Errors
    /// Returns `SqliteHandleError` if the delete fails.
    pub fn delete(&mut self, key: &str) -> Result<bool, SqliteHandleError> {
        let owner = self.owner();
        let removed = self
            .builtin(StatementSlot::DeleteConfig)?
            .execute([key])
            .map_err(|source| config_failure(owner, key, StatementSlot::DeleteConfig, source))?;
        Ok(removed > 0)
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>, SqliteHandleError> {
        let owner = self.owner();
        let value: Option<Option<String>> = self
            .builtin(StatementSlot::SelectConfigValue)?
            .query_row([key], |row| row.get(0))
            .optional()
            .map_err(|source| {
                config_failure(owner, key, StatementSlot::SelectConfigValue, source)
            })?;
        Ok(value.flatten())
    }
}

fn config_failure(
    owner: &str,
    key: &str,
    slot: StatementSlot,
    source: rusqlite::Error,
) -> SqliteHandleError {
    error!(owner = %owner, key, slot = ?slot, error = %source, "config statement failed");
    SqliteHandleError::execute_slot(slot, source)
}
