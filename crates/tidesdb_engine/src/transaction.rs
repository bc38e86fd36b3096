//! Transaction C API functions.

use crate::column_family::{validate_key, ColumnFamily};
use crate::database::{bytes_arg, engine_arg, str_arg};
use crate::error::{into_raw_result, EngineError, EngineResult, TidesDbError};
use crate::segment::LogRecord;
use crate::types::{TidesDbHandle, TidesDbTransaction};
use std::ffi::c_char;
use std::sync::Arc;

/// State of an engine-side transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
    /// Commit was attempted and failed.
    Aborted,
}

/// Staged mutations scoped to one column family.
///
/// Writes stay private until commit; readers outside the transaction never
/// see them.
#[derive(Debug)]
pub(crate) struct EngineTxn {
    cf: Arc<ColumnFamily>,
    start_seq: u64,
    ops: Vec<LogRecord>,
    state: TxnState,
}

impl EngineTxn {
    pub(crate) fn begin(cf: Arc<ColumnFamily>) -> Self {
        let start_seq = cf.seq();
        Self {
            cf,
            start_seq,
            ops: Vec::new(),
            state: TxnState::Active,
        }
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if self.state != TxnState::Active {
            return Err(EngineError::TxnNotActive);
        }
        Ok(())
    }

    pub(crate) fn put(&mut self, key: &[u8], value: &[u8], expires_at: i64) -> EngineResult<()> {
        self.ensure_active()?;
        validate_key(key)?;
        self.ops.push(LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at,
        });
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: &[u8]) -> EngineResult<()> {
        self.ensure_active()?;
        validate_key(key)?;
        self.ops.push(LogRecord::Delete { key: key.to_vec() });
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        let ops = std::mem::take(&mut self.ops);
        match self.cf.commit(ops, self.start_seq) {
            Ok(()) => {
                self.state = TxnState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = TxnState::Aborted;
                Err(e)
            }
        }
    }

    pub(crate) fn rollback(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        self.ops.clear();
        self.state = TxnState::RolledBack;
        Ok(())
    }
}

unsafe fn txn_arg<'a>(txn: *mut TidesDbTransaction) -> EngineResult<&'a mut EngineTxn> {
    if txn.is_null() {
        return Err(EngineError::NullPointer("transaction handle"));
    }
    Ok(&mut *txn.cast::<EngineTxn>())
}

/// Begins a transaction on one column family.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `txn` must be a valid pointer; it receives the handle on success
/// - `column_family` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_begin(
    tdb: *mut TidesDbHandle,
    txn: *mut *mut TidesDbTransaction,
    column_family: *const c_char,
) -> *mut TidesDbError {
    let result = (|| {
        if txn.is_null() {
            return Err(EngineError::NullPointer("transaction out-parameter"));
        }
        let engine = engine_arg(tdb)?;
        let cf = engine.column_family(str_arg(column_family, "column family name")?)?;
        *txn = Box::into_raw(Box::new(EngineTxn::begin(cf))).cast::<TidesDbTransaction>();
        Ok(())
    })();
    into_raw_result(result)
}

/// Stages a write.
///
/// `ttl` is an absolute Unix timestamp in seconds, or `-1` for no expiry.
///
/// # Safety
///
/// - `txn` must be a valid transaction handle
/// - `key` and `value` must be valid for their lengths
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_put(
    txn: *mut TidesDbTransaction,
    key: *const u8,
    key_size: usize,
    value: *const u8,
    value_size: usize,
    ttl: i64,
) -> *mut TidesDbError {
    let result = (|| {
        txn_arg(txn)?.put(
            bytes_arg(key, key_size, "key")?,
            bytes_arg(value, value_size, "value")?,
            ttl,
        )
    })();
    into_raw_result(result)
}

/// Stages a tombstone.
///
/// # Safety
///
/// - `txn` must be a valid transaction handle
/// - `key` must be valid for `key_size` bytes
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_delete(
    txn: *mut TidesDbTransaction,
    key: *const u8,
    key_size: usize,
) -> *mut TidesDbError {
    let result = (|| txn_arg(txn)?.delete(bytes_arg(key, key_size, "key")?))();
    into_raw_result(result)
}

/// Applies every staged mutation atomically.
///
/// # Safety
///
/// `txn` must be a valid transaction handle.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_commit(txn: *mut TidesDbTransaction) -> *mut TidesDbError {
    into_raw_result(txn_arg(txn).and_then(EngineTxn::commit))
}

/// Discards every staged mutation.
///
/// # Safety
///
/// `txn` must be a valid transaction handle.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_rollback(txn: *mut TidesDbTransaction) -> *mut TidesDbError {
    into_raw_result(txn_arg(txn).and_then(EngineTxn::rollback))
}

/// Releases a transaction handle in any state.
///
/// # Safety
///
/// `txn` must have been returned by [`tidesdb_txn_begin`] and must not be
/// used after this call.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_txn_free(txn: *mut TidesDbTransaction) -> *mut TidesDbError {
    if txn.is_null() {
        return EngineError::NullPointer("transaction handle").into_raw();
    }
    drop(Box::from_raw(txn.cast::<EngineTxn>()));
    std::ptr::null_mut()
}
