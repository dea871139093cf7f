// SQLite handle - the locked connection owner used by the mailbox layer
//
// This module is split into several sub-modules:
// - config: options applied when the database file is opened
// - connection: the handle, its lock token, and the operations available
//   while the lock is held (lifecycle, statement slots, transactions,
//   config table)

pub mod config;
pub mod connection;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::{SqliteHandle, SqliteLock, TransactionStats};
