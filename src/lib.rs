//! A locked SQLite handle for the mailbox storage layer.
//!
//! One [`SqliteHandle`] owns one connection. All work happens through the
//! [`SqliteLock`] accessor returned by [`SqliteHandle::lock`]:
//!
//! - statement slots: [`SqliteLock::predefine`] compiles a
//!   [`StatementSlot`] once and hands back the cached statement, reset, on
//!   every later call;
//! - nested transactions: [`SqliteLock::begin_transaction`],
//!   [`SqliteLock::commit`] and [`SqliteLock::rollback`] count nesting depth
//!   and only the outermost level reaches SQLite;
//! - the key/value config table: [`SqliteLock::get`], [`SqliteLock::set`] and
//!   their integer variants.
//!
//! ```no_run
//! use mailbox_sqlite::prelude::*;
//!
//! # fn main() -> Result<(), SqliteHandleError> {
//! let handle = SqliteHandle::new("mailbox");
//! let mut db = handle.lock();
//! db.open("/tmp/messenger.db")?;
//! db.begin_transaction();
//! db.set("configured", "1")?;
//! db.commit()?;
//! assert_eq!(db.get_int("configured", 0), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod prelude;
pub mod sqlite;
pub mod statements;

pub use error::SqliteHandleError;
pub use sqlite::{SqliteHandle, SqliteLock, SqliteOptions, SqliteOptionsBuilder, TransactionStats};
pub use statements::StatementSlot;
