//! The engine instance behind a database handle.

use crate::column_family::{ColumnFamily, CONFIG_FILE};
use crate::config::ColumnFamilyConfig;
use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const LOCK_FILE: &str = "LOCK";

/// Separator used by [`Engine::list_column_families`].
pub(crate) const LIST_SEPARATOR: char = '\n';

fn validate_name(name: &str) -> EngineResult<()> {
    if name.is_empty() {
        return Err(EngineError::invalid_argument("column family name is empty"));
    }
    if name == "." || name == ".." || name == LOCK_FILE {
        return Err(EngineError::invalid_argument(format!(
            "column family name {name:?} is reserved"
        )));
    }
    if name.contains(|c: char| matches!(c, '/' | '\\' | LIST_SEPARATOR)) {
        return Err(EngineError::invalid_argument(format!(
            "column family name {name:?} contains a path or list separator"
        )));
    }
    Ok(())
}

/// An open database rooted at one directory.
#[derive(Debug)]
pub(crate) struct Engine {
    dir: PathBuf,
    lock: File,
    column_families: RwLock<HashMap<String, Arc<ColumnFamily>>>,
}

impl Engine {
    /// Opens or creates the database at `dir` and takes its exclusive lock.
    pub(crate) fn open(dir: &Path) -> EngineResult<Self> {
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| EngineError::Locked(dir.to_path_buf()))?;

        let mut column_families = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || !entry.path().join(CONFIG_FILE).is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let cf = ColumnFamily::load(entry.path(), &name)?;
            column_families.insert(name, Arc::new(cf));
        }

        debug!(
            dir = %dir.display(),
            column_families = column_families.len(),
            "database opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            lock,
            column_families: RwLock::new(column_families),
        })
    }

    /// Syncs every column family and releases the directory lock.
    pub(crate) fn close(self) -> EngineResult<()> {
        let mut first_error = None;
        for cf in self.column_families.read().values() {
            if let Err(e) = cf.sync() {
                first_error.get_or_insert(e);
            }
        }
        self.lock.unlock()?;
        debug!(dir = %self.dir.display(), "database closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Creates a column family; fails if the name is taken.
    pub(crate) fn create_column_family(
        &self,
        name: &str,
        config: ColumnFamilyConfig,
    ) -> EngineResult<()> {
        validate_name(name)?;
        config.validate()?;

        let mut column_families = self.column_families.write();
        if column_families.contains_key(name) {
            return Err(EngineError::ColumnFamilyExists(name.to_string()));
        }
        let cf = ColumnFamily::create(self.dir.join(name), name, config)?;
        debug!(column_family = name, config = ?cf.config(), "column family created");
        column_families.insert(name.to_string(), Arc::new(cf));
        Ok(())
    }

    /// Deletes a column family with all its data.
    pub(crate) fn drop_column_family(&self, name: &str) -> EngineResult<()> {
        let mut column_families = self.column_families.write();
        let cf = column_families
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ColumnFamilyNotFound(name.to_string()))?;
        // Stays registered if its files cannot be removed.
        fs::remove_dir_all(cf.dir())?;
        column_families.remove(name);
        cf.mark_dropped();
        debug!(column_family = cf.name(), "column family dropped");
        Ok(())
    }

    /// Looks up a column family by name.
    pub(crate) fn column_family(&self, name: &str) -> EngineResult<Arc<ColumnFamily>> {
        self.column_families
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Sorted column family names joined by [`LIST_SEPARATOR`].
    pub(crate) fn list_column_families(&self) -> String {
        let column_families = self.column_families.read();
        let mut names: Vec<&str> = column_families.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(&LIST_SEPARATOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionAlgo, MemtableDs};
    use crate::types::NO_EXPIRY;
    use tempfile::tempdir;

    fn config() -> ColumnFamilyConfig {
        ColumnFamilyConfig {
            flush_threshold: 64 * 1024 * 1024,
            max_level: 12,
            probability: 0.24,
            compressed: false,
            compress_algo: CompressionAlgo::NoCompression,
            bloom_filter: false,
            memtable_ds: MemtableDs::SkipList,
        }
    }

    #[test]
    fn open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db");
        let engine = Engine::open(&path).unwrap();
        assert!(path.join(LOCK_FILE).is_file());
        engine.close().unwrap();
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        assert!(matches!(
            Engine::open(dir.path()),
            Err(EngineError::Locked(_))
        ));
        engine.close().unwrap();
        Engine::open(dir.path()).unwrap().close().unwrap();
    }

    #[test]
    fn column_families_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let engine = Engine::open(dir.path()).unwrap();
            engine.create_column_family("users", config()).unwrap();
            engine.create_column_family("events", config()).unwrap();
            engine
                .column_family("users")
                .unwrap()
                .put(b"k", b"v", NO_EXPIRY)
                .unwrap();
            engine.close().unwrap();
        }

        let engine = Engine::open(dir.path()).unwrap();
        assert_eq!(engine.list_column_families(), "events\nusers");
        assert_eq!(engine.column_family("users").unwrap().get(b"k").unwrap(), b"v");
        engine.close().unwrap();
    }

    #[test]
    fn duplicate_and_missing_names() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();

        engine.create_column_family("users", config()).unwrap();
        assert!(matches!(
            engine.create_column_family("users", config()),
            Err(EngineError::ColumnFamilyExists(_))
        ));

        engine.drop_column_family("users").unwrap();
        assert!(!dir.path().join("users").exists());
        assert!(matches!(
            engine.drop_column_family("users"),
            Err(EngineError::ColumnFamilyNotFound(_))
        ));
        assert!(matches!(
            engine.column_family("users"),
            Err(EngineError::ColumnFamilyNotFound(_))
        ));
        engine.close().unwrap();
    }

    #[test]
    fn failed_drop_keeps_column_family() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        engine.create_column_family("users", config()).unwrap();
        fs::remove_dir_all(dir.path().join("users")).unwrap();

        assert!(matches!(
            engine.drop_column_family("users"),
            Err(EngineError::Io(_))
        ));
        assert_eq!(engine.list_column_families(), "users");
        assert!(engine.column_family("users").is_ok());
        engine.close().unwrap();
    }

    #[test]
    fn invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        for name in ["", "..", "a/b", "a\nb", LOCK_FILE] {
            assert!(
                matches!(
                    engine.create_column_family(name, config()),
                    Err(EngineError::InvalidArgument(_))
                ),
                "{name:?} accepted"
            );
        }
        engine.close().unwrap();
    }

    #[test]
    fn invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut bad = config();
        bad.probability = 0.0;
        assert!(matches!(
            engine.create_column_family("users", bad),
            Err(EngineError::InvalidArgument(_))
        ));
        assert_eq!(engine.list_column_families(), "");
        engine.close().unwrap();
    }
}
