//! Host-visible status values and locally detected usage errors.

use thiserror::Error;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, Status>;

/// Status codes.
///
/// `0` is success. Engine failures carry the engine's own codes (see
/// [`crate::EngineErrorCode`]); codes from `1000` up are raised by the
/// binding itself and never reach the engine.
pub mod codes {
    /// Success.
    pub const OK: i32 = 0;
    /// Operation on a closed database.
    pub const DATABASE_CLOSED: i32 = 1000;
    /// Operation on a committed transaction.
    pub const TXN_COMMITTED: i32 = 1001;
    /// Operation on a rolled-back transaction.
    pub const TXN_ROLLED_BACK: i32 = 1002;
    /// Operation on a released transaction.
    pub const TXN_RELEASED: i32 = 1003;
    /// Operation on a transaction whose commit failed.
    pub const TXN_FAILED: i32 = 1004;
    /// Argument cannot be passed to the engine.
    pub const INVALID_ARGUMENT: i32 = 1005;
}

/// Message paired with [`codes::OK`].
pub const OK_MESSAGE: &str = "OK";

/// A failed call as the host sees it: numeric code plus message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct Status {
    /// Non-zero status code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl Status {
    /// Creates a status.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a local invalid-argument status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARGUMENT, message)
    }

    /// Returns true if the code was raised by the binding, not the engine.
    pub fn is_usage_error(&self) -> bool {
        self.code >= codes::DATABASE_CLOSED
    }

    /// Flattens a result into the host's `(code, message)` pair.
    pub fn pair<T>(result: &BindingResult<T>) -> (i32, String) {
        match result {
            Ok(_) => (codes::OK, OK_MESSAGE.to_string()),
            Err(status) => (status.code, status.message.clone()),
        }
    }
}

/// Illegal call sequences rejected before reaching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The database session was closed.
    #[error("database is closed")]
    DatabaseClosed,
    /// The transaction already committed.
    #[error("transaction already committed")]
    TransactionCommitted,
    /// The transaction was rolled back.
    #[error("transaction already rolled back")]
    TransactionRolledBack,
    /// The transaction handle was released.
    #[error("transaction already released")]
    TransactionReleased,
    /// A commit was attempted and failed; only release remains.
    #[error("transaction failed to commit and must be released")]
    TransactionFailed,
}

impl UsageError {
    /// Stable status code for this misuse.
    pub fn code(self) -> i32 {
        match self {
            Self::DatabaseClosed => codes::DATABASE_CLOSED,
            Self::TransactionCommitted => codes::TXN_COMMITTED,
            Self::TransactionRolledBack => codes::TXN_ROLLED_BACK,
            Self::TransactionReleased => codes::TXN_RELEASED,
            Self::TransactionFailed => codes::TXN_FAILED,
        }
    }
}

impl From<UsageError> for Status {
    fn from(err: UsageError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
