//! Transaction sessions and their state machine.

use crate::database::{missing_handle, DbSlot};
use crate::envelope::check;
use crate::marshal::c_string;
use crate::status::{BindingResult, UsageError};
use crate::ttl::absolute_expiry;
use parking_lot::Mutex;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use tidesdb_engine::{
    tidesdb_txn_begin, tidesdb_txn_commit, tidesdb_txn_delete, tidesdb_txn_free, tidesdb_txn_put,
    tidesdb_txn_rollback, TidesDbTransaction,
};
use tracing::{debug, warn};

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting writes.
    Active,
    /// Committed; only `free` is legal.
    Committed,
    /// Rolled back; only `free` is legal.
    RolledBack,
    /// Commit was attempted and failed; only `free` is legal.
    Failed,
    /// Handle released; nothing is legal.
    Released,
}

impl TransactionState {
    /// The usage error for staging, commit or rollback in this state.
    fn misuse(self) -> Option<UsageError> {
        match self {
            Self::Active => None,
            Self::Committed => Some(UsageError::TransactionCommitted),
            Self::RolledBack => Some(UsageError::TransactionRolledBack),
            Self::Failed => Some(UsageError::TransactionFailed),
            Self::Released => Some(UsageError::TransactionReleased),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Failed => "failed",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// Engine transaction handle.
#[derive(Debug)]
struct RawTxn(NonNull<TidesDbTransaction>);

// SAFETY: the handle is only touched while holding the transaction's mutex.
unsafe impl Send for RawTxn {}
// SAFETY: see above.
unsafe impl Sync for RawTxn {}

#[derive(Debug)]
struct TxnSlot {
    state: TransactionState,
    raw: Option<RawTxn>,
}

impl TxnSlot {
    /// The handle if the transaction is active.
    fn active(&self) -> BindingResult<*mut TidesDbTransaction> {
        if let Some(misuse) = self.state.misuse() {
            return Err(misuse.into());
        }
        match &self.raw {
            Some(raw) => Ok(raw.0.as_ptr()),
            None => Err(UsageError::TransactionReleased.into()),
        }
    }
}

/// A transaction on one column family.
///
/// Writes are staged in the engine and become visible together on
/// [`Transaction::commit`]. Staging, commit and rollback are rejected once
/// the transaction has left the active state or its database was closed.
/// The handle is released by [`Transaction::free`], or on drop.
pub struct Transaction {
    db: Arc<DbSlot>,
    column_family: String,
    slot: Mutex<TxnSlot>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("column_family", &self.column_family)
            .field("state", &self.slot.lock().state)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn begin(db: Arc<DbSlot>, column_family: &str) -> BindingResult<Self> {
        let c_cf = c_string(column_family, "column family name")?;
        let raw = db.with_handle(|tdb| {
            let mut txn: *mut TidesDbTransaction = ptr::null_mut();
            // SAFETY: live handle, valid out-parameter and C string.
            unsafe { check(tidesdb_txn_begin(tdb, &mut txn, c_cf.as_ptr()))? };
            NonNull::new(txn).ok_or_else(|| missing_handle("transaction"))
        })?;

        debug!(column_family, "transaction started");
        Ok(Self {
            db,
            column_family: column_family.to_string(),
            slot: Mutex::new(TxnSlot {
                state: TransactionState::Active,
                raw: Some(RawTxn(raw)),
            }),
        })
    }

    /// The column family this transaction writes to.
    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    /// The current state.
    pub fn state(&self) -> TransactionState {
        self.slot.lock().state
    }

    /// Stages a write. `ttl` is in seconds from now, or [`crate::NO_EXPIRY`].
    pub fn put(&self, key: &[u8], value: &[u8], ttl: i64) -> BindingResult<()> {
        let slot = self.slot.lock();
        let txn = slot.active()?;
        let expires_at = absolute_expiry(ttl);
        self.db.with_handle(|_| {
            // SAFETY: active handle; slices are valid for their lengths.
            unsafe {
                check(tidesdb_txn_put(
                    txn,
                    key.as_ptr(),
                    key.len(),
                    value.as_ptr(),
                    value.len(),
                    expires_at,
                ))
            }
        })
    }

    /// Stages a delete.
    pub fn delete(&self, key: &[u8]) -> BindingResult<()> {
        let slot = self.slot.lock();
        let txn = slot.active()?;
        self.db.with_handle(|_| {
            // SAFETY: active handle and valid key slice.
            unsafe { check(tidesdb_txn_delete(txn, key.as_ptr(), key.len())) }
        })
    }

    /// Applies every staged write atomically.
    ///
    /// If the engine rejects the commit the transaction becomes
    /// [`TransactionState::Failed`] and can only be freed.
    pub fn commit(&self) -> BindingResult<()> {
        let mut slot = self.slot.lock();
        let txn = slot.active()?;
        // SAFETY: active handle.
        let result = self.db.with_handle(|_| unsafe { check(tidesdb_txn_commit(txn)) });
        match &result {
            Ok(()) => slot.state = TransactionState::Committed,
            Err(status) if !status.is_usage_error() => {
                warn!(column_family = %self.column_family, %status, "commit failed");
                slot.state = TransactionState::Failed;
            }
            Err(_) => {}
        }
        result
    }

    /// Discards every staged write.
    pub fn rollback(&self) -> BindingResult<()> {
        let mut slot = self.slot.lock();
        let txn = slot.active()?;
        // SAFETY: active handle.
        self.db
            .with_handle(|_| unsafe { check(tidesdb_txn_rollback(txn)) })?;
        slot.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Releases the engine handle.
    ///
    /// Legal in every state except [`TransactionState::Released`]. Freeing an
    /// active transaction abandons its staged writes. Works after the
    /// database was closed.
    pub fn free(&self) -> BindingResult<()> {
        let mut slot = self.slot.lock();
        let raw = slot.raw.take().ok_or(UsageError::TransactionReleased)?;
        let previous = slot.state;
        slot.state = TransactionState::Released;
        debug!(column_family = %self.column_family, state = %previous, "transaction released");
        // SAFETY: the handle was taken out of the slot and is freed once.
        unsafe { check(tidesdb_txn_free(raw.0.as_ptr())) }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(raw) = slot.raw.take() {
            if slot.state == TransactionState::Active {
                warn!(column_family = %self.column_family, "active transaction dropped, staged writes discarded");
            }
            slot.state = TransactionState::Released;
            // SAFETY: last owner of the handle.
            if let Err(status) = unsafe { check(tidesdb_txn_free(raw.0.as_ptr())) } {
                warn!(column_family = %self.column_family, %status, "free on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnFamilyConfig;
    use crate::database::Database;
    use crate::status::codes;
    use crate::ttl::NO_EXPIRY;
    use tempfile::tempdir;
    use tidesdb_engine::ErrorCode;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().to_str().unwrap()).unwrap();
        db.create_column_family_with("users", &ColumnFamilyConfig::default())
            .unwrap();
        (dir, db)
    }

    #[test]
    fn commit_publishes_writes() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        assert_eq!(txn.column_family(), "users");

        txn.put(b"a", b"1", NO_EXPIRY).unwrap();
        txn.put(b"b", b"2", NO_EXPIRY).unwrap();
        assert!(db.get("users", b"a").is_err());

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(db.get("users", b"a").unwrap(), b"1");
        assert_eq!(db.get("users", b"b").unwrap(), b"2");
        txn.free().unwrap();
    }

    #[test]
    fn double_commit_is_rejected() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        txn.put(b"a", b"1", NO_EXPIRY).unwrap();
        txn.commit().unwrap();

        assert_eq!(txn.commit().unwrap_err().code, codes::TXN_COMMITTED);
        assert_eq!(txn.rollback().unwrap_err().code, codes::TXN_COMMITTED);
        assert_eq!(
            txn.put(b"c", b"3", NO_EXPIRY).unwrap_err().code,
            codes::TXN_COMMITTED
        );
    }

    #[test]
    fn commit_after_rollback_is_rejected() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        txn.put(b"a", b"1", NO_EXPIRY).unwrap();
        txn.rollback().unwrap();

        assert_eq!(txn.commit().unwrap_err().code, codes::TXN_ROLLED_BACK);
        assert_eq!(txn.delete(b"a").unwrap_err().code, codes::TXN_ROLLED_BACK);
        assert!(db.get("users", b"a").is_err());
    }

    #[test]
    fn double_free_is_rejected() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        txn.free().unwrap();
        assert_eq!(txn.state(), TransactionState::Released);

        assert_eq!(txn.free().unwrap_err().code, codes::TXN_RELEASED);
        assert_eq!(txn.commit().unwrap_err().code, codes::TXN_RELEASED);
        assert_eq!(
            txn.put(b"a", b"1", NO_EXPIRY).unwrap_err().code,
            codes::TXN_RELEASED
        );
    }

    #[test]
    fn conflict_fails_the_transaction() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        txn.put(b"k", b"mine", NO_EXPIRY).unwrap();
        db.put("users", b"k", b"theirs", NO_EXPIRY).unwrap();

        let status = txn.commit().unwrap_err();
        assert_eq!(status.code, ErrorCode::Conflict as i32);
        assert_eq!(txn.state(), TransactionState::Failed);
        assert_eq!(txn.commit().unwrap_err().code, codes::TXN_FAILED);
        assert_eq!(db.get("users", b"k").unwrap(), b"theirs");
        txn.free().unwrap();
    }

    #[test]
    fn closed_database_blocks_staging_but_not_free() {
        let (_dir, db) = open_temp();
        let txn = db.begin_transaction("users").unwrap();
        db.close().unwrap();

        assert_eq!(
            txn.put(b"a", b"1", NO_EXPIRY).unwrap_err().code,
            codes::DATABASE_CLOSED
        );
        assert_eq!(txn.commit().unwrap_err().code, codes::DATABASE_CLOSED);
        assert_eq!(txn.state(), TransactionState::Active);
        txn.free().unwrap();
    }

    #[test]
    fn begin_on_missing_column_family() {
        let (_dir, db) = open_temp();
        let status = db.begin_transaction("missing").unwrap_err();
        assert_eq!(status.code, ErrorCode::ColumnFamilyNotFound as i32);
    }

    #[test]
    fn drop_abandons_staged_writes() {
        let (_dir, db) = open_temp();
        {
            let txn = db.begin_transaction("users").unwrap();
            txn.put(b"a", b"1", NO_EXPIRY).unwrap();
        }
        assert!(db.get("users", b"a").is_err());
    }
}
