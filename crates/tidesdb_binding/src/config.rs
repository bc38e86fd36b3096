//! Column family configuration.

use crate::status::Status;

/// Compression algorithm selector.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionAlgorithm {
    /// No compression.
    #[default]
    None = 0,
    /// Snappy.
    Snappy = 1,
    /// LZ4.
    Lz4 = 2,
    /// Zstandard.
    Zstd = 3,
}

impl TryFrom<i64> for CompressionAlgorithm {
    type Error = Status;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Snappy),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::Zstd),
            other => Err(Status::invalid_argument(format!(
                "unknown compression algorithm {other}"
            ))),
        }
    }
}

/// Memtable data structure selector.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemtableKind {
    /// Skip list.
    #[default]
    SkipList = 0,
    /// Hash table.
    HashTable = 1,
}

impl TryFrom<i64> for MemtableKind {
    type Error = Status;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SkipList),
            1 => Ok(Self::HashTable),
            other => Err(Status::invalid_argument(format!(
                "unknown memtable data structure {other}"
            ))),
        }
    }
}

/// Settings for a new column family.
///
/// Values are forwarded to the engine unchanged; range checks happen there.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFamilyConfig {
    /// Memtable size in bytes before it is flushed.
    pub flush_threshold: i32,

    /// Maximum skip list level.
    pub max_level: i32,

    /// Skip list level probability.
    pub probability: f32,

    /// Whether values are compressed.
    pub compressed: bool,

    /// Compression algorithm used when `compressed` is set.
    pub compress_algo: CompressionAlgorithm,

    /// Whether SSTables carry a bloom filter.
    pub bloom_filter: bool,

    /// Memtable data structure.
    pub memtable: MemtableKind,
}

impl Default for ColumnFamilyConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 64 * 1024 * 1024, // 64 MB
            max_level: 12,
            probability: 0.24,
            compressed: false,
            compress_algo: CompressionAlgorithm::None,
            bloom_filter: false,
            memtable: MemtableKind::SkipList,
        }
    }
}

impl ColumnFamilyConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flush threshold in bytes.
    #[must_use]
    pub const fn flush_threshold(mut self, bytes: i32) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Sets the maximum skip list level.
    #[must_use]
    pub const fn max_level(mut self, level: i32) -> Self {
        self.max_level = level;
        self
    }

    /// Sets the skip list level probability.
    #[must_use]
    pub const fn probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    /// Enables compression with `algorithm`, or disables it for
    /// [`CompressionAlgorithm::None`].
    #[must_use]
    pub const fn compression(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.compressed = !matches!(algorithm, CompressionAlgorithm::None);
        self.compress_algo = algorithm;
        self
    }

    /// Sets whether SSTables carry a bloom filter.
    #[must_use]
    pub const fn bloom_filter(mut self, value: bool) -> Self {
        self.bloom_filter = value;
        self
    }

    /// Sets the memtable data structure.
    #[must_use]
    pub const fn memtable(mut self, kind: MemtableKind) -> Self {
        self.memtable = kind;
        self
    }
}
