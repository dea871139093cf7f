//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to open a handle,
//! take its lock, and work with statement slots and the config table.

pub use crate::error::SqliteHandleError;
pub use crate::sqlite::{
    SqliteHandle, SqliteLock, SqliteOptions, SqliteOptionsBuilder, TransactionStats,
};
pub use crate::statements::StatementSlot;

pub use rusqlite::{CachedStatement, OptionalExtension, Statement, params};
