//! Database C API functions.

use crate::buffer::{into_raw_buffer, into_raw_string};
use crate::config::{ColumnFamilyConfig, CompressionAlgo, MemtableDs};
use crate::engine::Engine;
use crate::error::{into_raw_result, EngineError, EngineResult, TidesDbError};
use crate::types::TidesDbHandle;
use std::ffi::{c_char, c_int, CStr};
use std::path::Path;

/// Borrows a C string argument as UTF-8.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, what: &'static str) -> EngineResult<&'a str> {
    if ptr.is_null() {
        return Err(EngineError::NullPointer(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| EngineError::invalid_argument(format!("invalid UTF-8 in {what}")))
}

/// Borrows a byte buffer argument.
pub(crate) unsafe fn bytes_arg<'a>(
    ptr: *const u8,
    len: usize,
    what: &'static str,
) -> EngineResult<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(EngineError::NullPointer(what));
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Borrows the engine behind a handle.
pub(crate) unsafe fn engine_arg<'a>(tdb: *mut TidesDbHandle) -> EngineResult<&'a Engine> {
    if tdb.is_null() {
        return Err(EngineError::NullPointer("database handle"));
    }
    Ok(&*tdb.cast::<Engine>())
}

/// Opens or creates a database rooted at `directory`.
///
/// # Safety
///
/// - `directory` must be a valid null-terminated string
/// - `tdb` must be a valid pointer; it receives the handle on success
#[no_mangle]
pub unsafe extern "C" fn tidesdb_open(
    directory: *const c_char,
    tdb: *mut *mut TidesDbHandle,
) -> *mut TidesDbError {
    into_raw_result(open(directory, tdb))
}

unsafe fn open(directory: *const c_char, tdb: *mut *mut TidesDbHandle) -> EngineResult<()> {
    if tdb.is_null() {
        return Err(EngineError::NullPointer("handle out-parameter"));
    }
    let directory = str_arg(directory, "directory")?;
    let engine = Engine::open(Path::new(directory))?;
    *tdb = Box::into_raw(Box::new(engine)).cast::<TidesDbHandle>();
    Ok(())
}

/// Flushes and closes a database.
///
/// The handle is released whether or not an error is reported.
///
/// # Safety
///
/// `tdb` must have been returned by [`tidesdb_open`] and must not be used
/// after this call.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_close(tdb: *mut TidesDbHandle) -> *mut TidesDbError {
    if tdb.is_null() {
        return EngineError::NullPointer("database handle").into_raw();
    }
    let engine = Box::from_raw(tdb.cast::<Engine>());
    into_raw_result(engine.close())
}

/// Creates a column family.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `name` must be a valid null-terminated string
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn tidesdb_create_column_family(
    tdb: *mut TidesDbHandle,
    name: *const c_char,
    flush_threshold: c_int,
    max_level: c_int,
    probability: f32,
    compressed: bool,
    compress_algo: c_int,
    bloom_filter: bool,
    memtable_ds: c_int,
) -> *mut TidesDbError {
    let result = (|| {
        let engine = engine_arg(tdb)?;
        let name = str_arg(name, "column family name")?;
        let config = ColumnFamilyConfig {
            flush_threshold,
            max_level,
            probability,
            compressed,
            compress_algo: CompressionAlgo::try_from(compress_algo)?,
            bloom_filter,
            memtable_ds: MemtableDs::try_from(memtable_ds)?,
        };
        engine.create_column_family(name, config)
    })();
    into_raw_result(result)
}

/// Drops a column family and all its data.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `name` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn tidesdb_drop_column_family(
    tdb: *mut TidesDbHandle,
    name: *const c_char,
) -> *mut TidesDbError {
    let result = (|| {
        let engine = engine_arg(tdb)?;
        engine.drop_column_family(str_arg(name, "column family name")?)
    })();
    into_raw_result(result)
}

/// Writes a key.
///
/// `ttl` is an absolute Unix timestamp in seconds, or `-1` for no expiry.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `column_family` must be a valid null-terminated string
/// - `key` and `value` must be valid for their lengths
#[no_mangle]
pub unsafe extern "C" fn tidesdb_put(
    tdb: *mut TidesDbHandle,
    column_family: *const c_char,
    key: *const u8,
    key_size: usize,
    value: *const u8,
    value_size: usize,
    ttl: i64,
) -> *mut TidesDbError {
    let result = (|| {
        let engine = engine_arg(tdb)?;
        let cf = engine.column_family(str_arg(column_family, "column family name")?)?;
        cf.put(
            bytes_arg(key, key_size, "key")?,
            bytes_arg(value, value_size, "value")?,
            ttl,
        )
    })();
    into_raw_result(result)
}

/// Reads a key.
///
/// On success `*value` receives a buffer of `*value_size` bytes that the
/// caller releases with [`crate::tidesdb_free_buffer`]. On failure both
/// out-parameters are left null/zero.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `column_family` must be a valid null-terminated string
/// - `key` must be valid for `key_size` bytes
/// - `value` and `value_size` must be valid pointers
#[no_mangle]
pub unsafe extern "C" fn tidesdb_get(
    tdb: *mut TidesDbHandle,
    column_family: *const c_char,
    key: *const u8,
    key_size: usize,
    value: *mut *mut u8,
    value_size: *mut usize,
) -> *mut TidesDbError {
    if value.is_null() || value_size.is_null() {
        return EngineError::NullPointer("value out-parameter").into_raw();
    }
    *value = std::ptr::null_mut();
    *value_size = 0;

    let result = (|| {
        let engine = engine_arg(tdb)?;
        let cf = engine.column_family(str_arg(column_family, "column family name")?)?;
        cf.get(bytes_arg(key, key_size, "key")?)
    })();

    match result {
        Ok(data) => {
            let (ptr, len) = into_raw_buffer(data);
            *value = ptr;
            *value_size = len;
            std::ptr::null_mut()
        }
        Err(e) => e.into_raw(),
    }
}

/// Writes a tombstone for a key. Succeeds if the key is absent.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `column_family` must be a valid null-terminated string
/// - `key` must be valid for `key_size` bytes
#[no_mangle]
pub unsafe extern "C" fn tidesdb_delete(
    tdb: *mut TidesDbHandle,
    column_family: *const c_char,
    key: *const u8,
    key_size: usize,
) -> *mut TidesDbError {
    let result = (|| {
        let engine = engine_arg(tdb)?;
        let cf = engine.column_family(str_arg(column_family, "column family name")?)?;
        cf.delete(bytes_arg(key, key_size, "key")?)
    })();
    into_raw_result(result)
}

/// Compacts a column family, blocking until the rewrite is complete.
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `column_family` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn tidesdb_compact_sstables(
    tdb: *mut TidesDbHandle,
    column_family: *const c_char,
    max_threads: c_int,
) -> *mut TidesDbError {
    let result = (|| {
        let engine = engine_arg(tdb)?;
        let cf = engine.column_family(str_arg(column_family, "column family name")?)?;
        let threads = usize::try_from(max_threads)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                EngineError::invalid_argument(format!(
                    "max threads must be at least 1, got {max_threads}"
                ))
            })?;
        cf.compact(threads)
    })();
    into_raw_result(result)
}

/// Lists column family names, sorted and separated by `'\n'`.
///
/// On success `*list` receives a string that the caller releases with
/// [`crate::tidesdb_free_string`].
///
/// # Safety
///
/// - `tdb` must be a valid database handle
/// - `list` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn tidesdb_list_column_families(
    tdb: *mut TidesDbHandle,
    list: *mut *mut c_char,
) -> *mut TidesDbError {
    if list.is_null() {
        return EngineError::NullPointer("list out-parameter").into_raw();
    }
    *list = std::ptr::null_mut();

    match engine_arg(tdb) {
        Ok(engine) => {
            *list = into_raw_string(&engine.list_column_families());
            std::ptr::null_mut()
        }
        Err(e) => e.into_raw(),
    }
}

/// Returns the engine version as a null-terminated string.
///
/// The returned pointer is static and must not be freed.
#[no_mangle]
pub extern "C" fn tidesdb_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast::<c_char>()
}
