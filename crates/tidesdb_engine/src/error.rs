//! Error codes, the engine error type and the heap-owned C error object.

use crate::stats;
use std::ffi::{c_char, c_int, CString};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Stable error codes reported in [`TidesDbError::code`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// I/O failure (directory or file access).
    Io = 1,
    /// Invalid configuration value or argument (including empty keys).
    InvalidArgument = 2,
    /// Key is absent, deleted or expired.
    NotFound = 3,
    /// Column family does not exist.
    ColumnFamilyNotFound = 4,
    /// Column family already exists.
    ColumnFamilyExists = 5,
    /// Transaction commit conflicted with another writer.
    Conflict = 6,
    /// On-disk data could not be decoded.
    Corruption = 7,
    /// Database directory is held by another handle.
    Locked = 8,
    /// Null pointer argument.
    NullPointer = 9,
    /// Transaction is no longer active.
    TxnNotActive = 10,
}

impl From<ErrorCode> for c_int {
    fn from(code: ErrorCode) -> Self {
        code as c_int
    }
}

/// Errors produced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Argument or configuration value rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Key not present.
    #[error("key not found")]
    KeyNotFound,

    /// Column family not present.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Column family name already taken.
    #[error("column family already exists: {0}")]
    ColumnFamilyExists(String),

    /// A staged key was written by someone else after the transaction began.
    #[error("transaction conflict in column family {0}")]
    Conflict(String),

    /// Stored data is unreadable.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Another handle holds the directory lock.
    #[error("database directory is locked: {}", .0.display())]
    Locked(PathBuf),

    /// Null pointer argument.
    #[error("null pointer argument: {0}")]
    NullPointer(&'static str),

    /// Transaction already committed or rolled back.
    #[error("transaction is no longer active")]
    TxnNotActive,
}

impl EngineError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption(message.into())
    }

    /// Returns the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::Io,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::KeyNotFound => ErrorCode::NotFound,
            Self::ColumnFamilyNotFound(_) => ErrorCode::ColumnFamilyNotFound,
            Self::ColumnFamilyExists(_) => ErrorCode::ColumnFamilyExists,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Corruption(_) => ErrorCode::Corruption,
            Self::Locked(_) => ErrorCode::Locked,
            Self::NullPointer(_) => ErrorCode::NullPointer,
            Self::TxnNotActive => ErrorCode::TxnNotActive,
        }
    }

    /// Moves this error onto the heap as a C error object.
    ///
    /// Ownership passes to the caller, who must release it with
    /// [`tidesdb_err_free`].
    pub(crate) fn into_raw(self) -> *mut TidesDbError {
        let message = CString::new(self.to_string().replace('\0', " ")).unwrap_or_default();
        stats::record_error_allocated();
        Box::into_raw(Box::new(TidesDbError {
            code: self.code().into(),
            message: message.into_raw(),
        }))
    }
}

/// Error object returned by every fallible C API call.
///
/// Memory is owned by the engine until returned; the caller then owns it and
/// must call [`tidesdb_err_free`] exactly once.
#[repr(C)]
#[derive(Debug)]
pub struct TidesDbError {
    /// Error code (see [`ErrorCode`]).
    pub code: c_int,
    /// Null-terminated UTF-8 message.
    pub message: *mut c_char,
}

/// Converts an engine result into the C convention: null on success.
pub(crate) fn into_raw_result(result: EngineResult<()>) -> *mut TidesDbError {
    match result {
        Ok(()) => std::ptr::null_mut(),
        Err(e) => e.into_raw(),
    }
}

/// Releases an error object returned by the engine.
///
/// # Safety
///
/// `err` must be null or a pointer returned by an engine call that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_err_free(err: *mut TidesDbError) {
    if err.is_null() {
        return;
    }
    let err = Box::from_raw(err);
    if !err.message.is_null() {
        drop(CString::from_raw(err.message));
    }
    stats::record_error_freed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tidesdb_alloc_stats;
    use std::ffi::CStr;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::Io as i32, 1);
        assert_eq!(ErrorCode::NotFound as i32, 3);
        assert_eq!(ErrorCode::Conflict as i32, 6);
        assert_eq!(ErrorCode::TxnNotActive as i32, 10);
    }

    #[test]
    fn error_maps_to_code() {
        assert_eq!(EngineError::KeyNotFound.code(), ErrorCode::NotFound);
        assert_eq!(
            EngineError::ColumnFamilyExists("users".into()).code(),
            ErrorCode::ColumnFamilyExists
        );
        assert_eq!(
            EngineError::invalid_argument("key is empty").code(),
            ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn raw_error_round_trip() {
        let before = tidesdb_alloc_stats();

        let raw = EngineError::ColumnFamilyNotFound("users".into()).into_raw();
        assert!(!raw.is_null());

        unsafe {
            assert_eq!((*raw).code, ErrorCode::ColumnFamilyNotFound as c_int);
            let message = CStr::from_ptr((*raw).message);
            assert_eq!(message.to_str().unwrap(), "column family not found: users");
            tidesdb_err_free(raw);
        }

        let after = tidesdb_alloc_stats();
        assert_eq!(after.errors_allocated, before.errors_allocated + 1);
        assert_eq!(after.errors_freed, before.errors_freed + 1);
    }

    #[test]
    fn interior_nul_does_not_lose_error() {
        let raw = EngineError::invalid_argument("bad\0name").into_raw();
        unsafe {
            let message = CStr::from_ptr((*raw).message);
            assert_eq!(message.to_str().unwrap(), "invalid argument: bad name");
            tidesdb_err_free(raw);
        }
    }

    #[test]
    fn ok_result_is_null() {
        assert!(into_raw_result(Ok(())).is_null());
    }

    #[test]
    fn free_null_is_noop() {
        let before = tidesdb_alloc_stats();
        unsafe { tidesdb_err_free(std::ptr::null_mut()) };
        assert_eq!(tidesdb_alloc_stats(), before);
    }
}
