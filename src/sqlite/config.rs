use serde::{Deserialize, Serialize};

use crate::error::SqliteHandleError;
use crate::statements::StatementSlot;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 10_000;
const AD_HOC_CACHE_HEADROOM: usize = 16;
/// Cached statements the handle keeps outside the slot set: the `sqlite_master`
/// table lookup.
pub(crate) const INTERNAL_CACHED_STATEMENTS: usize = 1;

/// Options applied when a `SqliteHandle` opens its database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    pub busy_timeout_ms: u64,
    /// Value for `PRAGMA journal_mode`, left to the engine default when unset.
    pub journal_mode: Option<String>,
    pub create_config_table: bool,
    /// Capacity of the compiled-statement cache. Values below the slot count
    /// plus the handle's own cached lookups are raised so that slots are
    /// never evicted.
    pub statement_cache_capacity: usize,
    pub read_only: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: None,
            create_config_table: true,
            statement_cache_capacity: StatementSlot::COUNT + AD_HOC_CACHE_HEADROOM,
            read_only: false,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn builder() -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new()
    }

    /// Parse options from a JSON object; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::ConfigError` if the text is not valid JSON
    /// for these options.
    pub fn from_json(text: &str) -> Result<Self, SqliteHandleError> {
        serde_json::from_str(text)
            .map_err(|e| SqliteHandleError::ConfigError(format!("invalid sqlite options: {e}")))
    }

    pub(crate) fn effective_cache_capacity(&self) -> usize {
        self.statement_cache_capacity
            .max(StatementSlot::COUNT + INTERNAL_CACHED_STATEMENTS)
    }
}

/// Fluent builder for `SqliteOptions`.
#[derive(Debug, Clone, Default)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.busy_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.opts.journal_mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn create_config_table(mut self, create: bool) -> Self {
        self.opts.create_config_table = create;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let opts = SqliteOptions::from_json(r#"{"journal_mode": "WAL"}"#).unwrap();
        assert_eq!(opts.journal_mode.as_deref(), Some("WAL"));
        assert_eq!(opts.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(opts.create_config_table);
        assert!(!opts.read_only);
    }

    #[test]
    fn json_rejects_wrong_types() {
        let err = SqliteOptions::from_json(r#"{"busy_timeout_ms": "soon"}"#).unwrap_err();
        assert!(matches!(err, SqliteHandleError::ConfigError(_)));
    }

    #[test]
    fn cache_capacity_never_drops_below_slot_count() {
        let opts = SqliteOptions::builder().statement_cache_capacity(2).finish();
        assert_eq!(
            opts.effective_cache_capacity(),
            StatementSlot::COUNT + INTERNAL_CACHED_STATEMENTS
        );
        let opts = SqliteOptions::builder()
            .statement_cache_capacity(StatementSlot::COUNT)
            .finish();
        assert!(opts.effective_cache_capacity() > StatementSlot::COUNT);
        let opts = SqliteOptions::builder().statement_cache_capacity(100).finish();
        assert_eq!(opts.effective_cache_capacity(), 100);
    }
}
