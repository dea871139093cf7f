use thiserror::Error;

use crate::statements::StatementSlot;

#[derive(Debug, Error)]
pub enum SqliteHandleError {
    #[error("database is already open")]
    AlreadyOpen,

    #[error("database is not open")]
    NotOpen,

    #[error("cannot open database {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot prepare {context}: {source}")]
    PrepareFailed {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot execute {context}: {source}")]
    ExecuteFailed {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other database error: {0}")]
    Other(String),

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),
}

impl SqliteHandleError {
    pub(crate) fn prepare_slot(slot: StatementSlot, source: rusqlite::Error) -> Self {
        SqliteHandleError::PrepareFailed {
            context: format!("slot {slot:?}"),
            source,
        }
    }

    pub(crate) fn prepare_sql(sql: &str, source: rusqlite::Error) -> Self {
        SqliteHandleError::PrepareFailed {
            context: format!("\"{sql}\""),
            source,
        }
    }

    pub(crate) fn execute_slot(slot: StatementSlot, source: rusqlite::Error) -> Self {
        SqliteHandleError::ExecuteFailed {
            context: format!("slot {slot:?}"),
            source,
        }
    }

    pub(crate) fn execute_sql(sql: &str, source: rusqlite::Error) -> Self {
        SqliteHandleError::ExecuteFailed {
            context: format!("\"{sql}\""),
            source,
        }
    }

    /// Split out the underlying SQLite error, handing back errors that have none.
    pub(crate) fn into_engine_error(self) -> Result<rusqlite::Error, Self> {
        match self {
            SqliteHandleError::OpenFailed { source, .. }
            | SqliteHandleError::PrepareFailed { source, .. }
            | SqliteHandleError::ExecuteFailed { source, .. }
            | SqliteHandleError::SqliteError(source) => Ok(source),
            other => Err(other),
        }
    }

    /// The engine's diagnostic text, if this error came from SQLite.
    #[must_use]
    pub fn engine_message(&self) -> Option<String> {
        match self {
            SqliteHandleError::OpenFailed { source, .. }
            | SqliteHandleError::PrepareFailed { source, .. }
            | SqliteHandleError::ExecuteFailed { source, .. }
            | SqliteHandleError::SqliteError(source) => Some(source.to_string()),
            _ => None,
        }
    }
}
