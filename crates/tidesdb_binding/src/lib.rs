//! # TidesDB binding layer
//!
//! Safe, host-agnostic sessions over the TidesDB engine API.
//!
//! The engine reports failures as heap-owned error objects and returns
//! reads as heap-owned buffers. This crate turns both into owned Rust values
//! and releases the engine allocation exactly once, before control returns
//! to the host. Database and transaction handles live inside capability
//! objects ([`Database`], [`Transaction`]) instead of process-wide state,
//! so any number of databases can be open at once.
//!
//! Every failure is a [`Status`] carrying a numeric code and a message.
//! Engine codes pass through unchanged; illegal call sequences (use after
//! close, double commit, double free) are caught here and reported with the
//! codes in [`codes`].
//!
//! ```rust,no_run
//! use tidesdb_binding::{ColumnFamilyConfig, Database, NO_EXPIRY};
//!
//! let db = Database::open("/tmp/tides")?;
//! db.create_column_family_with("users", &ColumnFamilyConfig::default())?;
//!
//! let txn = db.begin_transaction("users")?;
//! txn.put(b"alice", b"admin", NO_EXPIRY)?;
//! txn.put(b"bob", b"viewer", 3600)?;
//! txn.commit()?;
//! txn.free()?;
//!
//! db.close()?;
//! # Ok::<(), tidesdb_binding::Status>(())
//! ```

#![warn(missing_docs)]

mod config;
mod database;
mod envelope;
mod marshal;
mod status;
mod transaction;
mod ttl;

pub use config::{ColumnFamilyConfig, CompressionAlgorithm, MemtableKind};
pub use database::{Database, LIST_SEPARATOR};
pub use status::{codes, BindingResult, Status, UsageError, OK_MESSAGE};
pub use transaction::{Transaction, TransactionState};
pub use ttl::{absolute_expiry, absolute_expiry_at, NO_EXPIRY};

/// Error codes reported by the engine.
pub use tidesdb_engine::ErrorCode as EngineErrorCode;

/// Version of the engine this binding talks to.
pub fn engine_version() -> String {
    // SAFETY: the engine returns a static null-terminated string.
    unsafe { std::ffi::CStr::from_ptr(tidesdb_engine::tidesdb_version()) }
        .to_string_lossy()
        .into_owned()
}

/// Binding version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
