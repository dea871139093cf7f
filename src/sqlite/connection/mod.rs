mod config_table;
mod core;
mod prepared;
mod tx;

pub use core::{SqliteHandle, SqliteLock};
pub use tx::TransactionStats;
