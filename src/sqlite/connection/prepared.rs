use rusqlite::{CachedStatement, Statement};
use tracing::{error, trace};

use crate::error::SqliteHandleError;
use crate::statements::StatementSlot;

use super::SqliteLock;

const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1;";

impl SqliteLock<'_> {
    /// Fetch the compiled statement for `slot`, compiling it from `sql` on
    /// first use.
    ///
    /// The statement comes back with no bound parameters and its cursor
    /// rewound, ready for fresh binding. `sql` must be the same text on every
    /// call for a given slot while the connection is open; debug builds trap
    /// a mismatch.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::NotOpen` on a closed handle, or
    /// `SqliteHandleError::PrepareFailed` if SQLite rejects `sql`.
    pub fn predefine(
        &mut self,
        slot: StatementSlot,
        sql: &str,
    ) -> Result<CachedStatement<'_>, SqliteHandleError> {
        let same_sql = self.state.slots.get(&slot).map(|known| known.as_ref() == sql);
        match same_sql {
            Some(true) => {}
            Some(false) => {
                let compiled = self.state.slots.get(&slot).map(ToString::to_string);
                error!(
                    owner = %self.owner(),
                    slot = ?slot,
                    compiled = ?compiled,
                    requested = %sql,
                    "statement slot reused with different SQL"
                );
                debug_assert!(false, "statement slot {slot:?} redefined");
            }
            None => {
                // compile once before recording the slot so a bad statement never counts
                let compiled = self.conn()?.prepare_cached(sql).map(drop);
                if let Err(source) = compiled {
                    error!(
                        owner = %self.owner(),
                        slot = ?slot,
                        error = %source,
                        "cannot prepare statement slot"
                    );
                    return Err(SqliteHandleError::prepare_slot(slot, source));
                }
                trace!(owner = %self.owner(), slot = ?slot, "statement slot compiled");
                self.state.slots.insert(slot, sql.into());
            }
        }

        let owner = self.owner();
        self.conn()?.prepare_cached(sql).map_err(|source| {
            error!(owner = %owner, slot = ?slot, error = %source, "cannot prepare statement slot");
            SqliteHandleError::prepare_slot(slot, source)
        })
    }

    /// Fetch a slot whose SQL is owned by this crate.
    pub(crate) fn builtin(
        &mut self,
        slot: StatementSlot,
    ) -> Result<CachedStatement<'_>, SqliteHandleError> {
        let sql = slot.builtin_sql().ok_or_else(|| {
            SqliteHandleError::Other(format!("slot {slot:?} has no built-in SQL"))
        })?;
        self.predefine(slot, sql)
    }

    /// Compile a one-off statement outside the slot cache. It is finalized
    /// when the returned value is dropped.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::NotOpen` on a closed handle, or
    /// `SqliteHandleError::PrepareFailed` if SQLite rejects `sql`.
    pub fn prepare_ad_hoc(&self, sql: &str) -> Result<Statement<'_>, SqliteHandleError> {
        self.conn()?.prepare(sql).map_err(|source| {
            error!(owner = %self.owner(), sql = %sql, error = %source, "cannot prepare statement");
            SqliteHandleError::prepare_sql(sql, source)
        })
    }

    /// Run parameterless SQL that returns no rows, such as schema DDL.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::NotOpen` on a closed handle, or
    /// `SqliteHandleError::ExecuteFailed` if SQLite reports an error.
    pub fn execute(&self, sql: &str) -> Result<(), SqliteHandleError> {
        self.conn()?.execute_batch(sql).map_err(|source| {
            error!(owner = %self.owner(), sql = %sql, error = %source, "cannot execute statement");
            SqliteHandleError::execute_sql(sql, source)
        })
    }

    /// Whether a table called `name` exists in the open database.
    ///
    /// # Errors
    /// Fails only when the connection is closed or unusable.
    pub fn table_exists(&self, name: &str) -> Result<bool, SqliteHandleError> {
        let count: i64 = self
            .conn()?
            .prepare_cached(TABLE_EXISTS_SQL)
            .and_then(|mut stmt| stmt.query_row([name], |row| row.get(0)))
            .map_err(|source| {
                error!(owner = %self.owner(), table = %name, error = %source, "cannot query schema");
                SqliteHandleError::SqliteError(source)
            })?;
        Ok(count > 0)
    }

    /// Number of slots compiled on the live connection.
    #[must_use]
    pub fn compiled_slots(&self) -> usize {
        self.state.slots.len()
    }
}
