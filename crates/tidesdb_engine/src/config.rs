//! Column family configuration.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Compression algorithm selector.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgo {
    /// No compression.
    NoCompression = 0,
    /// Snappy.
    Snappy = 1,
    /// LZ4.
    Lz4 = 2,
    /// Zstandard.
    Zstd = 3,
}

impl TryFrom<i32> for CompressionAlgo {
    type Error = EngineError;

    fn try_from(value: i32) -> EngineResult<Self> {
        match value {
            0 => Ok(Self::NoCompression),
            1 => Ok(Self::Snappy),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::Zstd),
            other => Err(EngineError::invalid_argument(format!(
                "unknown compression algorithm {other}"
            ))),
        }
    }
}

/// Memtable data structure selector.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemtableDs {
    /// Skip list.
    SkipList = 0,
    /// Hash table.
    HashTable = 1,
}

impl TryFrom<i32> for MemtableDs {
    type Error = EngineError;

    fn try_from(value: i32) -> EngineResult<Self> {
        match value {
            0 => Ok(Self::SkipList),
            1 => Ok(Self::HashTable),
            other => Err(EngineError::invalid_argument(format!(
                "unknown memtable data structure {other}"
            ))),
        }
    }
}

/// Persisted configuration of one column family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFamilyConfig {
    /// Memtable flush threshold in bytes.
    pub flush_threshold: i32,
    /// Maximum skip list level.
    pub max_level: i32,
    /// Skip list level probability.
    pub probability: f32,
    /// Whether SSTable blocks are compressed.
    pub compressed: bool,
    /// Compression algorithm; ignored unless `compressed` is set.
    pub compress_algo: CompressionAlgo,
    /// Whether SSTables carry a bloom filter.
    pub bloom_filter: bool,
    /// Memtable data structure.
    pub memtable_ds: MemtableDs,
}

impl ColumnFamilyConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> EngineResult<()> {
        if self.flush_threshold <= 0 {
            return Err(EngineError::invalid_argument(format!(
                "flush threshold must be positive, got {}",
                self.flush_threshold
            )));
        }
        if self.max_level <= 0 {
            return Err(EngineError::invalid_argument(format!(
                "max level must be positive, got {}",
                self.max_level
            )));
        }
        if !(self.probability > 0.0 && self.probability < 1.0) {
            return Err(EngineError::invalid_argument(format!(
                "probability must be in (0, 1), got {}",
                self.probability
            )));
        }
        Ok(())
    }
}
