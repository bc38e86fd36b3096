//! # TidesDB engine API
//!
//! The narrow, C-style API through which host bindings reach the storage
//! engine.
//!
//! Conventions shared by every exported function:
//! - A null return means success. Failure returns a heap-owned
//!   [`TidesDbError`] that the caller must release with [`tidesdb_err_free`].
//! - Read calls fill out-parameters with heap-owned buffers or strings on
//!   success only. Release them with [`tidesdb_free_buffer`] and
//!   [`tidesdb_free_string`].
//! - Handles ([`TidesDbHandle`], [`TidesDbTransaction`]) are opaque.
//!
//! Behind the API sits a compact reference engine: one directory per
//! database, one subdirectory per column family, an append-only record log
//! replayed on open. Memtable layout, SSTable format, bloom filters and
//! compression are configuration only.

#![warn(missing_docs)]

mod buffer;
mod column_family;
mod config;
mod database;
mod engine;
mod error;
mod segment;
mod stats;
mod transaction;
mod types;

pub use buffer::{tidesdb_free_buffer, tidesdb_free_string};
pub use config::{ColumnFamilyConfig, CompressionAlgo, MemtableDs};
pub use database::{
    tidesdb_close, tidesdb_compact_sstables, tidesdb_create_column_family, tidesdb_delete,
    tidesdb_drop_column_family, tidesdb_get, tidesdb_list_column_families, tidesdb_open,
    tidesdb_put, tidesdb_version,
};
pub use error::{tidesdb_err_free, EngineError, EngineResult, ErrorCode, TidesDbError};
pub use stats::{tidesdb_alloc_stats, TidesDbAllocStats};
pub use transaction::{
    tidesdb_txn_begin, tidesdb_txn_commit, tidesdb_txn_delete, tidesdb_txn_free,
    tidesdb_txn_put, tidesdb_txn_rollback,
};
pub use types::{TidesDbHandle, TidesDbTransaction, NO_EXPIRY};
