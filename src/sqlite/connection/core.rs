use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, error, info, warn};

use crate::error::SqliteHandleError;
use crate::sqlite::config::SqliteOptions;
use crate::statements::StatementSlot;

use super::tx::TransactionStats;

/// Everything guarded by the handle's mutex.
#[derive(Default)]
pub(crate) struct SqliteState {
    pub(crate) conn: Option<Connection>,
    pub(crate) path: Option<PathBuf>,
    /// SQL each slot was first compiled from on the live connection.
    pub(crate) slots: HashMap<StatementSlot, Box<str>>,
    pub(crate) transaction_depth: u32,
    pub(crate) stats: TransactionStats,
}

/// Owner of one SQLite connection, usable by one logical caller at a time.
///
/// Nothing on the handle itself touches the database: callers take the lock
/// with [`SqliteHandle::lock`] and work through the returned [`SqliteLock`].
/// The lock is not reentrant. Taking it twice on the same thread without
/// releasing it first blocks forever, so lock once at the highest call level
/// that needs atomicity and pass the `SqliteLock` down.
pub struct SqliteHandle {
    owner: String,
    options: SqliteOptions,
    state: Mutex<SqliteState>,
}

impl SqliteHandle {
    /// Create a closed handle. `owner` labels every log line this handle emits.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self::with_options(owner, SqliteOptions::default())
    }

    #[must_use]
    pub fn with_options(owner: impl Into<String>, options: SqliteOptions) -> Self {
        Self {
            owner: owner.into(),
            options,
            state: Mutex::new(SqliteState::default()),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// Acquire exclusive access, blocking until the current holder releases it.
    pub fn lock(&self) -> SqliteLock<'_> {
        SqliteLock {
            owner: &self.owner,
            options: &self.options,
            state: self.state.lock(),
        }
    }

    /// Acquire exclusive access if nobody holds it right now.
    pub fn try_lock(&self) -> Option<SqliteLock<'_>> {
        self.state.try_lock().map(|state| SqliteLock {
            owner: &self.owner,
            options: &self.options,
            state,
        })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }
}

impl Drop for SqliteHandle {
    fn drop(&mut self) {
        close_state(&self.owner, self.state.get_mut());
    }
}

impl fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteHandle")
            .field("owner", &self.owner)
            .field("options", &self.options)
            .field("locked", &self.state.is_locked())
            .finish()
    }
}

/// Accessor that exists only while the handle's lock is held.
///
/// Dropping it (or calling [`SqliteLock::unlock`]) releases the lock.
pub struct SqliteLock<'a> {
    owner: &'a str,
    options: &'a SqliteOptions,
    pub(crate) state: MutexGuard<'a, SqliteState>,
}

impl<'a> SqliteLock<'a> {
    /// Open (creating if absent) the database file at `path`.
    ///
    /// # Errors
    /// Returns `SqliteHandleError::AlreadyOpen` if a connection is live, or
    /// `SqliteHandleError::OpenFailed` if SQLite cannot open or configure the
    /// file. The handle stays closed on failure.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), SqliteHandleError> {
        let path = path.as_ref();
        if self.state.conn.is_some() {
            warn!(owner = %self.owner, path = %path.display(), "open: database already open");
            return Err(SqliteHandleError::AlreadyOpen);
        }

        let conn = Connection::open_with_flags(path, open_flags(self.options))
            .and_then(|conn| configure(&conn, self.options).map(|()| conn))
            .map_err(|source| {
                error!(
                    owner = %self.owner,
                    path = %path.display(),
                    error = %source,
                    "cannot open database"
                );
                SqliteHandleError::OpenFailed {
                    path: path.display().to_string(),
                    source,
                }
            })?;

        self.state.conn = Some(conn);
        self.state.path = Some(path.to_path_buf());
        self.state.slots.clear();
        self.state.transaction_depth = 0;

        if self.options.create_config_table && !self.options.read_only {
            if let Err(err) = self.ensure_config_table() {
                self.close();
                return Err(match err.into_engine_error() {
                    Ok(source) => {
                        error!(
                            owner = %self.owner,
                            path = %path.display(),
                            error = %source,
                            "cannot open database"
                        );
                        SqliteHandleError::OpenFailed {
                            path: path.display().to_string(),
                            source,
                        }
                    }
                    Err(other) => other,
                });
            }
        }

        info!(owner = %self.owner, path = %path.display(), "database opened");
        Ok(())
    }

    /// Finalize every compiled slot and release the connection. Closing a
    /// closed handle does nothing.
    pub fn close(&mut self) {
        close_state(self.owner, &mut self.state);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.conn.is_some()
    }

    /// Path given to the last successful `open`, while the connection is live.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.state.path.as_deref()
    }

    /// Release the lock. Equivalent to dropping the accessor.
    pub fn unlock(self) {}

    pub(crate) fn owner(&self) -> &'a str {
        self.owner
    }

    pub(crate) fn conn(&self) -> Result<&Connection, SqliteHandleError> {
        self.state.conn.as_ref().ok_or_else(|| {
            debug!(owner = %self.owner, "operation on closed database");
            SqliteHandleError::NotOpen
        })
    }
}

impl fmt::Debug for SqliteLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLock")
            .field("owner", &self.owner)
            .field("open", &self.state.conn.is_some())
            .field("transaction_depth", &self.state.transaction_depth)
            .finish()
    }
}

fn open_flags(options: &SqliteOptions) -> OpenFlags {
    let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if options.read_only {
        base | OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    }
}

fn configure(conn: &Connection, options: &SqliteOptions) -> Result<(), rusqlite::Error> {
    conn.set_prepared_statement_cache_capacity(options.effective_cache_capacity());
    conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;
    if let Some(mode) = options.journal_mode.as_deref() {
        if mode.is_empty() || !mode.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(rusqlite::Error::InvalidParameterName(format!(
                "journal_mode={mode}"
            )));
        }
        // journal_mode answers with the mode actually in effect
        let applied: String =
            conn.query_row(&format!("PRAGMA journal_mode={mode};"), [], |row| row.get(0))?;
        debug!(requested = mode, applied = %applied, "journal mode set");
    }
    Ok(())
}

fn close_state(owner: &str, state: &mut SqliteState) {
    let Some(conn) = state.conn.take() else {
        return;
    };
    if state.transaction_depth > 0 {
        warn!(
            owner = %owner,
            depth = state.transaction_depth,
            "closing database inside a transaction; uncommitted work is discarded"
        );
    }

    let compiled = state.slots.len();
    conn.flush_prepared_statement_cache();
    state.slots.clear();
    state.transaction_depth = 0;
    let path = state.path.take();

    if let Err((_conn, err)) = conn.close() {
        error!(owner = %owner, error = %err, "error while closing database");
    }
    debug!(
        owner = %owner,
        path = ?path,
        finalized_slots = compiled,
        "database closed"
    );
}
