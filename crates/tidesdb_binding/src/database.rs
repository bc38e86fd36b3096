//! Database sessions.

use crate::config::{ColumnFamilyConfig, CompressionAlgorithm, MemtableKind};
use crate::envelope::check;
use crate::marshal::{c_string, take_buffer, take_string};
use crate::status::{BindingResult, Status, UsageError};
use crate::transaction::Transaction;
use crate::ttl::absolute_expiry;
use parking_lot::RwLock;
use std::ffi::c_char;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use tidesdb_engine::{
    tidesdb_close, tidesdb_compact_sstables, tidesdb_create_column_family, tidesdb_delete,
    tidesdb_drop_column_family, tidesdb_get, tidesdb_list_column_families, tidesdb_open,
    tidesdb_put, ErrorCode, TidesDbHandle,
};
use tracing::{debug, warn};

/// Separator between names in a column family listing.
pub const LIST_SEPARATOR: char = '\n';

/// Engine database handle.
#[derive(Debug)]
struct RawDb(NonNull<TidesDbHandle>);

// SAFETY: the engine handle is internally synchronized; the slot lock keeps
// it from being closed while a call is in flight.
unsafe impl Send for RawDb {}
// SAFETY: see above.
unsafe impl Sync for RawDb {}

/// The handle of one open database, shared with its transactions.
#[derive(Debug)]
pub(crate) struct DbSlot {
    directory: String,
    handle: RwLock<Option<RawDb>>,
}

impl DbSlot {
    /// Runs `f` with the live handle, or fails with `DATABASE_CLOSED`.
    ///
    /// The read lock is held for the duration of `f`, so a concurrent close
    /// waits for in-flight calls.
    pub(crate) fn with_handle<T>(
        &self,
        f: impl FnOnce(*mut TidesDbHandle) -> BindingResult<T>,
    ) -> BindingResult<T> {
        let guard = self.handle.read();
        let raw = guard.as_ref().ok_or(UsageError::DatabaseClosed)?;
        f(raw.0.as_ptr())
    }

    fn is_open(&self) -> bool {
        self.handle.read().is_some()
    }

    fn close(&self) -> BindingResult<()> {
        let raw = self
            .handle
            .write()
            .take()
            .ok_or(UsageError::DatabaseClosed)?;
        // SAFETY: the handle was taken out of the slot, nothing else can reach it.
        let result = unsafe { check(tidesdb_close(raw.0.as_ptr())) };
        debug!(directory = %self.directory, ok = result.is_ok(), "database closed");
        result
    }
}

impl Drop for DbSlot {
    fn drop(&mut self) {
        if let Some(raw) = self.handle.get_mut().take() {
            warn!(directory = %self.directory, "database dropped while open, closing");
            // SAFETY: last owner of the slot.
            if let Err(status) = unsafe { check(tidesdb_close(raw.0.as_ptr())) } {
                warn!(directory = %self.directory, %status, "close on drop failed");
            }
        }
    }
}

/// Fails with an engine-style status when a successful call returned no handle.
pub(crate) fn missing_handle(what: &str) -> Status {
    Status::new(
        ErrorCode::NullPointer as i32,
        format!("engine returned no {what} handle"),
    )
}

/// An open database.
///
/// Every session owns its own engine handle; two sessions on different
/// directories never share state. Operations after [`Database::close`] fail
/// with `DATABASE_CLOSED`. Dropping an open session closes it.
///
/// # Example
///
/// ```rust,no_run
/// use tidesdb_binding::{ColumnFamilyConfig, Database, NO_EXPIRY};
///
/// let db = Database::open("/tmp/tides")?;
/// db.create_column_family_with("users", &ColumnFamilyConfig::default())?;
/// db.put("users", b"alice", b"admin", NO_EXPIRY)?;
/// assert_eq!(db.get("users", b"alice")?, b"admin");
/// db.close()?;
/// # Ok::<(), tidesdb_binding::Status>(())
/// ```
#[derive(Debug)]
pub struct Database {
    slot: Arc<DbSlot>,
}

impl Database {
    /// Opens or creates the database at `directory`.
    pub fn open(directory: &str) -> BindingResult<Self> {
        let c_directory = c_string(directory, "directory")?;
        let mut handle: *mut TidesDbHandle = ptr::null_mut();
        // SAFETY: valid C string and out-parameter.
        unsafe { check(tidesdb_open(c_directory.as_ptr(), &mut handle))? };
        let handle = NonNull::new(handle).ok_or_else(|| missing_handle("database"))?;

        debug!(directory, "database opened");
        Ok(Self {
            slot: Arc::new(DbSlot {
                directory: directory.to_string(),
                handle: RwLock::new(Some(RawDb(handle))),
            }),
        })
    }

    /// Closes the database. A second close fails with `DATABASE_CLOSED`.
    ///
    /// The handle is released even when the engine reports an error.
    pub fn close(&self) -> BindingResult<()> {
        self.slot.close()
    }

    /// Returns true until [`Database::close`] succeeds or fails.
    pub fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    /// The directory this session was opened on.
    pub fn directory(&self) -> &str {
        &self.slot.directory
    }

    /// Creates a column family from positional settings.
    #[allow(clippy::too_many_arguments)]
    pub fn create_column_family(
        &self,
        name: &str,
        flush_threshold: i32,
        max_level: i32,
        probability: f32,
        compressed: bool,
        compress_algo: CompressionAlgorithm,
        bloom_filter: bool,
        memtable: MemtableKind,
    ) -> BindingResult<()> {
        self.create_column_family_with(
            name,
            &ColumnFamilyConfig {
                flush_threshold,
                max_level,
                probability,
                compressed,
                compress_algo,
                bloom_filter,
                memtable,
            },
        )
    }

    /// Creates a column family from a [`ColumnFamilyConfig`].
    pub fn create_column_family_with(
        &self,
        name: &str,
        config: &ColumnFamilyConfig,
    ) -> BindingResult<()> {
        let c_name = c_string(name, "column family name")?;
        self.slot.with_handle(|tdb| {
            // SAFETY: live handle and valid C string.
            unsafe {
                check(tidesdb_create_column_family(
                    tdb,
                    c_name.as_ptr(),
                    config.flush_threshold,
                    config.max_level,
                    config.probability,
                    config.compressed,
                    config.compress_algo as i32,
                    config.bloom_filter,
                    config.memtable as i32,
                ))
            }
        })
    }

    /// Drops a column family and all its data.
    pub fn drop_column_family(&self, name: &str) -> BindingResult<()> {
        let c_name = c_string(name, "column family name")?;
        self.slot.with_handle(|tdb| {
            // SAFETY: live handle and valid C string.
            unsafe { check(tidesdb_drop_column_family(tdb, c_name.as_ptr())) }
        })
    }

    /// Stores a value. `ttl` is in seconds from now, or [`crate::NO_EXPIRY`].
    pub fn put(&self, column_family: &str, key: &[u8], value: &[u8], ttl: i64) -> BindingResult<()> {
        let c_cf = c_string(column_family, "column family name")?;
        let expires_at = absolute_expiry(ttl);
        self.slot.with_handle(|tdb| {
            // SAFETY: live handle; slices are valid for their lengths.
            unsafe {
                check(tidesdb_put(
                    tdb,
                    c_cf.as_ptr(),
                    key.as_ptr(),
                    key.len(),
                    value.as_ptr(),
                    value.len(),
                    expires_at,
                ))
            }
        })
    }

    /// Reads a value. Absent, deleted and expired keys fail with the
    /// engine's not-found status.
    pub fn get(&self, column_family: &str, key: &[u8]) -> BindingResult<Vec<u8>> {
        let c_cf = c_string(column_family, "column family name")?;
        self.slot.with_handle(|tdb| {
            let mut value: *mut u8 = ptr::null_mut();
            let mut value_size: usize = 0;
            // SAFETY: live handle, valid key slice and out-parameters. The
            // buffer is taken only after the call reported success.
            unsafe {
                check(tidesdb_get(
                    tdb,
                    c_cf.as_ptr(),
                    key.as_ptr(),
                    key.len(),
                    &mut value,
                    &mut value_size,
                ))?;
                Ok(take_buffer(value, value_size))
            }
        })
    }

    /// Deletes a key. Deleting an absent key succeeds.
    pub fn delete(&self, column_family: &str, key: &[u8]) -> BindingResult<()> {
        let c_cf = c_string(column_family, "column family name")?;
        self.slot.with_handle(|tdb| {
            // SAFETY: live handle and valid key slice.
            unsafe { check(tidesdb_delete(tdb, c_cf.as_ptr(), key.as_ptr(), key.len())) }
        })
    }

    /// Compacts a column family, blocking until the engine finishes.
    pub fn compact_sstables(&self, column_family: &str, max_threads: i32) -> BindingResult<()> {
        let c_cf = c_string(column_family, "column family name")?;
        self.slot.with_handle(|tdb| {
            // SAFETY: live handle and valid C string.
            unsafe { check(tidesdb_compact_sstables(tdb, c_cf.as_ptr(), max_threads)) }
        })
    }

    /// Column family names separated by [`LIST_SEPARATOR`], sorted.
    pub fn list_column_families(&self) -> BindingResult<String> {
        self.slot.with_handle(|tdb| {
            let mut list: *mut c_char = ptr::null_mut();
            // SAFETY: live handle and valid out-parameter; the string is
            // taken only after success.
            unsafe {
                check(tidesdb_list_column_families(tdb, &mut list))?;
                Ok(take_string(list))
            }
        })
    }

    /// Column family names as a list.
    pub fn column_families(&self) -> BindingResult<Vec<String>> {
        Ok(self
            .list_column_families()?
            .split(LIST_SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Begins a transaction scoped to one column family.
    pub fn begin_transaction(&self, column_family: &str) -> BindingResult<Transaction> {
        Transaction::begin(Arc::clone(&self.slot), column_family)
    }
}
