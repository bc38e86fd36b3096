//! Python bindings for TidesDB.
//!
//! Every call returns a status-first tuple: `(status, message)`, or
//! `(status, message, value)` when a read, open or begin succeeds. Status
//! `0` means success; callers check it before touching the value.
//!
//! ```python
//! import tidesdb
//!
//! status, message, db = tidesdb.open("/tmp/tides")
//! db.create_column_family("users")
//! db.put("users", b"alice", b"admin", -1)
//! status, message, value = db.get("users", b"alice")
//! db.close()
//! ```

use pyo3::exceptions::{PyIOError, PyRuntimeError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use pyo3::IntoPyObject;
use std::path::PathBuf;
use tidesdb_binding::{
    codes, engine_version, BindingResult, ColumnFamilyConfig, CompressionAlgorithm,
    Database as BindingDatabase, MemtableKind, Status, Transaction as BindingTransaction,
    TransactionState, NO_EXPIRY, OK_MESSAGE,
};

/// Library version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `(status, message)`.
fn reply(py: Python<'_>, result: &BindingResult<()>) -> PyResult<PyObject> {
    let (code, message) = Status::pair(result);
    Ok((code, message).into_pyobject(py)?.into_any().unbind())
}

/// `(0, "OK", value)` on success, `(status, message)` otherwise.
fn reply_with<'py, T>(py: Python<'py>, result: BindingResult<T>) -> PyResult<PyObject>
where
    T: IntoPyObject<'py>,
{
    match result {
        Ok(value) => Ok((codes::OK, OK_MESSAGE, value)
            .into_pyobject(py)?
            .into_any()
            .unbind()),
        Err(status) => Ok((status.code, status.message)
            .into_pyobject(py)?
            .into_any()
            .unbind()),
    }
}

/// Accepts `bytes` or `str` (UTF-8 encoded) for keys and values.
fn host_bytes(value: &Bound<'_, PyAny>, what: &str) -> BindingResult<Vec<u8>> {
    if let Ok(bytes) = value.downcast::<PyBytes>() {
        return Ok(bytes.as_bytes().to_vec());
    }
    value
        .extract::<String>()
        .map(String::into_bytes)
        .map_err(|_| Status::invalid_argument(format!("{what} must be bytes or str")))
}

fn host_i32(value: i64, what: &str) -> BindingResult<i32> {
    i32::try_from(value)
        .map_err(|_| Status::invalid_argument(format!("{what} {value} is out of range")))
}

/// A database transaction scoped to one column family.
///
/// Usable as a context manager: commits on a clean exit, rolls back when
/// the block raises, then frees the handle.
#[pyclass(name = "Transaction")]
pub struct PyTransaction {
    inner: BindingTransaction,
}

#[pymethods]
impl PyTransaction {
    /// Stages a write. `ttl` is seconds from now, or -1 for no expiry.
    #[pyo3(signature = (key, value, ttl=NO_EXPIRY))]
    fn put(
        &self,
        py: Python<'_>,
        key: &Bound<'_, PyAny>,
        value: &Bound<'_, PyAny>,
        ttl: i64,
    ) -> PyResult<PyObject> {
        let result = host_bytes(key, "key").and_then(|key| {
            let value = host_bytes(value, "value")?;
            self.inner.put(&key, &value, ttl)
        });
        reply(py, &result)
    }

    /// Stages a delete.
    fn delete(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let result = host_bytes(key, "key").and_then(|key| self.inner.delete(&key));
        reply(py, &result)
    }

    /// Applies every staged write atomically.
    fn commit(&self, py: Python<'_>) -> PyResult<PyObject> {
        reply(py, &self.inner.commit())
    }

    /// Discards every staged write.
    fn rollback(&self, py: Python<'_>) -> PyResult<PyObject> {
        reply(py, &self.inner.rollback())
    }

    /// Releases the transaction handle.
    fn free(&self, py: Python<'_>) -> PyResult<PyObject> {
        reply(py, &self.inner.free())
    }

    /// The column family this transaction writes to.
    #[getter]
    fn column_family(&self) -> &str {
        self.inner.column_family()
    }

    /// Lifecycle state: "active", "committed", "rolled back", "failed" or
    /// "released".
    #[getter]
    fn state(&self) -> String {
        self.inner.state().to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "Transaction(column_family={:?}, state={:?})",
            self.inner.column_family(),
            self.inner.state().to_string()
        )
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (exc_type=None, _exc_val=None, _exc_tb=None))]
    fn __exit__(
        &self,
        exc_type: Option<PyObject>,
        _exc_val: Option<PyObject>,
        _exc_tb: Option<PyObject>,
    ) -> PyResult<bool> {
        let outcome = if self.inner.state() == TransactionState::Active {
            if exc_type.is_some() {
                self.inner.rollback()
            } else {
                self.inner.commit()
            }
        } else {
            Ok(())
        };
        if self.inner.state() != TransactionState::Released {
            self.inner
                .free()
                .map_err(|status| PyRuntimeError::new_err(status.to_string()))?;
        }
        outcome.map_err(|status| PyRuntimeError::new_err(status.to_string()))?;
        Ok(false)
    }
}

/// An open TidesDB database.
///
/// Usable as a context manager: closes on exit.
#[pyclass(name = "Database")]
pub struct PyDatabase {
    inner: BindingDatabase,
}

#[pymethods]
impl PyDatabase {
    /// Closes the database.
    fn close(&self, py: Python<'_>) -> PyResult<PyObject> {
        reply(py, &self.inner.close())
    }

    /// Creates a column family.
    #[pyo3(signature = (
        name,
        flush_threshold=64 * 1024 * 1024,
        max_level=12,
        probability=0.24,
        compressed=false,
        compress_algo=0,
        bloom_filter=false,
        memtable_ds=0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn create_column_family(
        &self,
        py: Python<'_>,
        name: &str,
        flush_threshold: i64,
        max_level: i64,
        probability: f64,
        compressed: bool,
        compress_algo: i64,
        bloom_filter: bool,
        memtable_ds: i64,
    ) -> PyResult<PyObject> {
        let result = (|| {
            let config = ColumnFamilyConfig {
                flush_threshold: host_i32(flush_threshold, "flush threshold")?,
                max_level: host_i32(max_level, "max level")?,
                probability: probability as f32,
                compressed,
                compress_algo: CompressionAlgorithm::try_from(compress_algo)?,
                bloom_filter,
                memtable: MemtableKind::try_from(memtable_ds)?,
            };
            self.inner.create_column_family_with(name, &config)
        })();
        reply(py, &result)
    }

    /// Drops a column family and all its data.
    fn drop_column_family(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        reply(py, &self.inner.drop_column_family(name))
    }

    /// Stores a value. `ttl` is seconds from now, or -1 for no expiry.
    #[pyo3(signature = (column_family, key, value, ttl=NO_EXPIRY))]
    fn put(
        &self,
        py: Python<'_>,
        column_family: &str,
        key: &Bound<'_, PyAny>,
        value: &Bound<'_, PyAny>,
        ttl: i64,
    ) -> PyResult<PyObject> {
        let result = host_bytes(key, "key").and_then(|key| {
            let value = host_bytes(value, "value")?;
            self.inner.put(column_family, &key, &value, ttl)
        });
        reply(py, &result)
    }

    /// Reads a value as bytes.
    fn get(
        &self,
        py: Python<'_>,
        column_family: &str,
        key: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let result = host_bytes(key, "key")
            .and_then(|key| self.inner.get(column_family, &key))
            .map(|value| PyBytes::new(py, &value));
        reply_with(py, result)
    }

    /// Deletes a key. Deleting an absent key succeeds.
    fn delete(
        &self,
        py: Python<'_>,
        column_family: &str,
        key: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let result = host_bytes(key, "key").and_then(|key| self.inner.delete(column_family, &key));
        reply(py, &result)
    }

    /// Compacts a column family. Blocks until done; the GIL is released
    /// meanwhile.
    fn compact_sstables(
        &self,
        py: Python<'_>,
        column_family: &str,
        max_threads: i64,
    ) -> PyResult<PyObject> {
        let result = host_i32(max_threads, "max threads").and_then(|max_threads| {
            py.allow_threads(|| self.inner.compact_sstables(column_family, max_threads))
        });
        reply(py, &result)
    }

    /// Column family names separated by newlines.
    fn list_column_families(&self, py: Python<'_>) -> PyResult<PyObject> {
        reply_with(py, self.inner.list_column_families())
    }

    /// Begins a transaction on one column family.
    fn begin_transaction(&self, py: Python<'_>, column_family: &str) -> PyResult<PyObject> {
        let result = self
            .inner
            .begin_transaction(column_family)
            .map(|inner| PyTransaction { inner });
        reply_with(py, result)
    }

    /// Whether the database is open.
    #[getter]
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// The directory the database was opened on.
    #[getter]
    fn directory(&self) -> &str {
        self.inner.directory()
    }

    fn __repr__(&self) -> String {
        format!(
            "Database(directory={:?}, open={})",
            self.inner.directory(),
            self.inner.is_open()
        )
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type=None, _exc_val=None, _exc_tb=None))]
    fn __exit__(
        &self,
        _exc_type: Option<PyObject>,
        _exc_val: Option<PyObject>,
        _exc_tb: Option<PyObject>,
    ) -> PyResult<bool> {
        if self.inner.is_open() {
            self.inner
                .close()
                .map_err(|status| PyIOError::new_err(status.to_string()))?;
        }
        Ok(false)
    }
}

/// Opens or creates a database.
#[pyfunction]
fn open(py: Python<'_>, directory: PathBuf) -> PyResult<PyObject> {
    let result = directory
        .to_str()
        .ok_or_else(|| Status::invalid_argument("directory is not valid UTF-8"))
        .and_then(BindingDatabase::open)
        .map(|inner| PyDatabase { inner });
    reply_with(py, result)
}

/// Returns the binding and engine versions.
#[pyfunction]
fn version() -> (&'static str, String) {
    (VERSION, engine_version())
}

/// Python module initialization.
#[pymodule]
fn tidesdb(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDatabase>()?;
    m.add_class::<PyTransaction>()?;
    m.add_function(wrap_pyfunction!(open, m)?)?;
    m.add_function(wrap_pyfunction!(version, m)?)?;

    m.add("NO_COMPRESSION", CompressionAlgorithm::None as i32)?;
    m.add("COMPRESS_SNAPPY", CompressionAlgorithm::Snappy as i32)?;
    m.add("COMPRESS_LZ4", CompressionAlgorithm::Lz4 as i32)?;
    m.add("COMPRESS_ZSTD", CompressionAlgorithm::Zstd as i32)?;
    m.add("SKIP_LIST", MemtableKind::SkipList as i32)?;
    m.add("HASH_TABLE", MemtableKind::HashTable as i32)?;
    m.add("TDB_MEMTABLE_SKIP_LIST", MemtableKind::SkipList as i32)?;
    m.add("TDB_MEMTABLE_HASH_TABLE", MemtableKind::HashTable as i32)?;
    m.add("NO_EXPIRY", NO_EXPIRY)?;

    m.add("OK", codes::OK)?;
    m.add("DATABASE_CLOSED", codes::DATABASE_CLOSED)?;
    m.add("TXN_COMMITTED", codes::TXN_COMMITTED)?;
    m.add("TXN_ROLLED_BACK", codes::TXN_ROLLED_BACK)?;
    m.add("TXN_RELEASED", codes::TXN_RELEASED)?;
    m.add("TXN_FAILED", codes::TXN_FAILED)?;
    m.add("INVALID_ARGUMENT", codes::INVALID_ARGUMENT)?;
    Ok(())
}
