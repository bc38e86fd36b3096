//! Column family: an ordered memtable rebuilt from its record log.

use crate::config::ColumnFamilyConfig;
use crate::error::{EngineError, EngineResult};
use crate::segment::{self, LogRecord, SegmentLog};
use crate::types::{is_expired, now_unix, NO_EXPIRY};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::info;

/// Configuration file inside a column family directory.
pub(crate) const CONFIG_FILE: &str = "config.cbor";
/// Record log inside a column family directory.
pub(crate) const LOG_FILE: &str = "data.log";

/// Rejects keys the engine cannot store.
pub(crate) fn validate_key(key: &[u8]) -> EngineResult<()> {
    if key.is_empty() {
        return Err(EngineError::invalid_argument("key must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Entry {
    /// `None` marks a tombstone.
    value: Option<Vec<u8>>,
    expires_at: i64,
    /// Sequence number of the write that produced this entry.
    seq: u64,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.value.is_some() && !is_expired(self.expires_at, now)
    }
}

#[derive(Debug)]
struct State {
    memtable: BTreeMap<Vec<u8>, Entry>,
    log: SegmentLog,
    seq: u64,
    /// `seq` at the last compaction. Tombstones and expired entries at or
    /// below it are gone from the memtable.
    compacted_seq: u64,
}

impl State {
    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Put {
                key,
                value,
                expires_at,
            } => {
                self.seq += 1;
                let seq = self.seq;
                self.memtable.insert(
                    key,
                    Entry {
                        value: Some(value),
                        expires_at,
                        seq,
                    },
                );
            }
            LogRecord::Delete { key } => {
                self.seq += 1;
                let seq = self.seq;
                self.memtable.insert(
                    key,
                    Entry {
                        value: None,
                        expires_at: NO_EXPIRY,
                        seq,
                    },
                );
            }
            LogRecord::Batch(records) => {
                for record in records {
                    self.apply(record);
                }
            }
        }
    }

    fn log_and_apply(&mut self, record: LogRecord) -> EngineResult<()> {
        self.log.append(&record)?;
        self.apply(record);
        Ok(())
    }
}

/// A named keyspace with its own configuration and storage.
#[derive(Debug)]
pub(crate) struct ColumnFamily {
    name: String,
    dir: PathBuf,
    config: ColumnFamilyConfig,
    dropped: AtomicBool,
    state: RwLock<State>,
}

impl ColumnFamily {
    /// Creates the directory, persists the configuration and opens an empty log.
    pub(crate) fn create(dir: PathBuf, name: &str, config: ColumnFamilyConfig) -> EngineResult<Self> {
        fs::create_dir_all(&dir)?;
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&config, &mut bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        fs::write(dir.join(CONFIG_FILE), bytes)?;
        Self::open(dir, name, config)
    }

    /// Loads an existing column family from its directory.
    pub(crate) fn load(dir: PathBuf, name: &str) -> EngineResult<Self> {
        let bytes = fs::read(dir.join(CONFIG_FILE))?;
        let config: ColumnFamilyConfig = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| EngineError::corruption(format!("column family {name} config: {e}")))?;
        Self::open(dir, name, config)
    }

    fn open(dir: PathBuf, name: &str, config: ColumnFamilyConfig) -> EngineResult<Self> {
        let (log, records) = SegmentLog::open(&dir.join(LOG_FILE))?;
        let mut state = State {
            memtable: BTreeMap::new(),
            log,
            seq: 0,
            compacted_seq: 0,
        };
        for record in records {
            state.apply(record);
        }

        Ok(Self {
            name: name.to_string(),
            dir,
            config,
            dropped: AtomicBool::new(false),
            state: RwLock::new(state),
        })
    }

    /// Column family name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding this column family.
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persisted configuration.
    pub(crate) fn config(&self) -> &ColumnFamilyConfig {
        &self.config
    }

    /// Marks the column family as dropped; later calls report not-found.
    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.dropped.load(Ordering::Acquire) {
            return Err(EngineError::ColumnFamilyNotFound(self.name.clone()));
        }
        Ok(())
    }

    /// Sequence number of the latest applied write.
    pub(crate) fn seq(&self) -> u64 {
        self.state.read().seq
    }

    /// Writes a key with an absolute expiry (or [`NO_EXPIRY`]).
    pub(crate) fn put(&self, key: &[u8], value: &[u8], expires_at: i64) -> EngineResult<()> {
        validate_key(key)?;
        self.ensure_live()?;
        self.state.write().log_and_apply(LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at,
        })
    }

    /// Reads a live value.
    pub(crate) fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>> {
        validate_key(key)?;
        self.ensure_live()?;
        let state = self.state.read();
        match state.memtable.get(key) {
            Some(entry) if entry.is_live(now_unix()) => Ok(entry.value.clone().unwrap_or_default()),
            _ => Err(EngineError::KeyNotFound),
        }
    }

    /// Writes a tombstone. Deleting an absent key succeeds.
    pub(crate) fn delete(&self, key: &[u8]) -> EngineResult<()> {
        validate_key(key)?;
        self.ensure_live()?;
        self.state
            .write()
            .log_and_apply(LogRecord::Delete { key: key.to_vec() })
    }

    /// Applies staged mutations atomically.
    ///
    /// Fails with a conflict if any staged key was written after `start_seq`.
    /// A key missing from the memtable is treated as possibly written when a
    /// compaction ran after `start_seq`, since its tombstone may be gone.
    pub(crate) fn commit(&self, ops: Vec<LogRecord>, start_seq: u64) -> EngineResult<()> {
        self.ensure_live()?;
        if ops.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write();
        for op in &ops {
            let key = match op {
                LogRecord::Put { key, .. } | LogRecord::Delete { key } => key,
                LogRecord::Batch(_) => continue,
            };
            let changed = match state.memtable.get(key) {
                Some(entry) => entry.seq > start_seq,
                None => start_seq < state.compacted_seq,
            };
            if changed {
                return Err(EngineError::Conflict(self.name.clone()));
            }
        }
        state.log_and_apply(LogRecord::Batch(ops))
    }

    /// Rewrites the log keeping only live entries. Blocks until done.
    ///
    /// Encoding is split across at most `max_threads` scoped workers.
    pub(crate) fn compact(&self, max_threads: usize) -> EngineResult<()> {
        self.ensure_live()?;
        let mut state = self.state.write();
        let now = now_unix();
        let bytes_before = state.log.size();
        let entries_before = state.memtable.len();

        state.memtable.retain(|_, entry| entry.is_live(now));
        let records: Vec<LogRecord> = state
            .memtable
            .iter()
            .map(|(key, entry)| LogRecord::Put {
                key: key.clone(),
                value: entry.value.clone().unwrap_or_default(),
                expires_at: entry.expires_at,
            })
            .collect();

        let chunk = records.len().div_ceil(max_threads.max(1)).max(1);
        let frames = thread::scope(|scope| {
            let workers: Vec<_> = records
                .chunks(chunk)
                .map(|part| {
                    scope.spawn(move || {
                        part.iter()
                            .map(segment::encode)
                            .collect::<EngineResult<Vec<_>>>()
                    })
                })
                .collect();

            let mut frames = Vec::with_capacity(records.len());
            for worker in workers {
                let part = worker.join().map_err(|_| {
                    io::Error::new(io::ErrorKind::Other, "compaction worker panicked")
                })?;
                frames.extend(part?);
            }
            Ok::<_, EngineError>(frames)
        })?;

        state.log.rewrite(&frames)?;
        state.compacted_seq = state.seq;
        info!(
            column_family = %self.name,
            max_threads,
            entries_before,
            entries_after = state.memtable.len(),
            bytes_before,
            bytes_after = state.log.size(),
            "compaction finished"
        );
        Ok(())
    }

    /// Flushes the log to disk.
    pub(crate) fn sync(&self) -> EngineResult<()> {
        self.state.read().log.sync()
    }
}
