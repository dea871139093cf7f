use tracing::{debug, error, warn};

use crate::error::SqliteHandleError;
use crate::statements::StatementSlot;

use super::SqliteLock;

/// Physical transaction statements that completed successfully since the
/// handle was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begins: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

impl SqliteLock<'_> {
    /// Enter a (possibly nested) transaction. Only the outermost call issues
    /// a real `BEGIN`.
    ///
    /// A failed `BEGIN` is logged and the depth still counts the call, so the
    /// caller's matching `commit`/`rollback` stays balanced; the failure shows
    /// up when the statements that follow fail.
    pub fn begin_transaction(&mut self) {
        if self.state.conn.is_none() {
            warn!(owner = %self.owner(), "begin_transaction on closed database");
            return;
        }
        self.state.transaction_depth += 1;
        if self.state.transaction_depth == 1 {
            match self.run_control(StatementSlot::BeginTransaction) {
                Ok(()) => self.state.stats.begins += 1,
                Err(err) => error!(owner = %self.owner(), error = %err, "cannot begin transaction"),
            }
        } else {
            debug!(
                owner = %self.owner(),
                depth = self.state.transaction_depth,
                "nested begin_transaction"
            );
        }
    }

    /// Leave one transaction level. Only the outermost call issues a real
    /// `COMMIT`; calling this outside a transaction is logged and ignored.
    ///
    /// If the physical `COMMIT` fails and SQLite is still inside the
    /// transaction, it is rolled back so the depth and the engine agree.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::NotOpen` on a closed handle, or the
    /// `ExecuteFailed` error of the physical `COMMIT`.
    pub fn commit(&mut self) -> Result<(), SqliteHandleError> {
        self.conn()?;
        if !self.leave_level("commit") {
            return Ok(());
        }
        match self.run_control(StatementSlot::CommitTransaction) {
            Ok(()) => {
                self.state.stats.commits += 1;
                Ok(())
            }
            Err(err) => {
                error!(owner = %self.owner(), error = %err, "cannot commit transaction");
                if self.in_physical_transaction() {
                    if let Err(rollback_err) = self.physical_rollback() {
                        warn!(
                            owner = %self.owner(),
                            error = %rollback_err,
                            "rollback after failed commit also failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Leave one transaction level. Only the outermost call issues a real
    /// `ROLLBACK`; an inner rollback just decrements the depth and the work
    /// is discarded once the outermost level rolls back. Calling this outside
    /// a transaction is logged and ignored.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::NotOpen` on a closed handle, or the
    /// `ExecuteFailed` error of the physical `ROLLBACK`.
    pub fn rollback(&mut self) -> Result<(), SqliteHandleError> {
        self.conn()?;
        if !self.leave_level("rollback") {
            return Ok(());
        }
        self.physical_rollback()
    }

    /// Run `func` inside a nested transaction: commit when it returns `Ok`,
    /// roll back when it returns `Err`.
    ///
    /// # Errors
    /// Returns the closure's error, or the error of the closing
    /// `commit`.
    pub fn with_transaction<T, F>(&mut self, func: F) -> Result<T, SqliteHandleError>
    where
        F: FnOnce(&mut Self) -> Result<T, SqliteHandleError>,
    {
        self.begin_transaction();
        match func(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    warn!(owner = %self.owner(), error = %rollback_err, "rollback after failure also failed");
                }
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn transaction_depth(&self) -> u32 {
        self.state.transaction_depth
    }

    /// Whether SQLite itself is inside a transaction right now.
    #[must_use]
    pub fn in_physical_transaction(&self) -> bool {
        self.state
            .conn
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    #[must_use]
    pub fn transaction_stats(&self) -> TransactionStats {
        self.state.stats
    }

    /// Decrement the depth. Returns true when the outermost level was left.
    fn leave_level(&mut self, op: &str) -> bool {
        match self.state.transaction_depth {
            0 => {
                warn!(owner = %self.owner(), op, "called outside a transaction; ignored");
                false
            }
            1 => {
                self.state.transaction_depth = 0;
                true
            }
            depth => {
                self.state.transaction_depth = depth - 1;
                debug!(owner = %self.owner(), op, depth = depth - 1, "nested transaction level left");
                false
            }
        }
    }

    fn physical_rollback(&mut self) -> Result<(), SqliteHandleError> {
        match self.run_control(StatementSlot::RollbackTransaction) {
            Ok(()) => {
                self.state.stats.rollbacks += 1;
                Ok(())
            }
            Err(err) => {
                error!(owner = %self.owner(), error = %err, "cannot roll back transaction");
                Err(err)
            }
        }
    }

    fn run_control(&mut self, slot: StatementSlot) -> Result<(), SqliteHandleError> {
        let mut stmt = self.builtin(slot)?;
        stmt.execute([])
            .map(drop)
            .map_err(|source| SqliteHandleError::execute_slot(slot, source))
    }
}
