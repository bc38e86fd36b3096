//! Append-only record log backing a column family.
//!
//! Each record is framed as a little-endian `u32` length followed by the
//! CBOR-encoded [`LogRecord`]. A short trailing frame is a torn write from
//! an interrupted append and is cut off when the log is opened.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const LEN_PREFIX: usize = 4;

/// A logged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum LogRecord {
    /// Insert or overwrite a key.
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        expires_at: i64,
    },
    /// Tombstone a key.
    Delete { key: Vec<u8> },
    /// Mutations applied all-or-nothing (one transaction commit).
    Batch(Vec<LogRecord>),
}

/// Encodes a record into its on-disk frame.
pub(crate) fn encode(record: &LogRecord) -> EngineResult<Vec<u8>> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(record, &mut body)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let len = u32::try_from(body.len())
        .map_err(|_| EngineError::invalid_argument("record larger than 4 GiB"))?;

    let mut framed = Vec::with_capacity(LEN_PREFIX + body.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Decodes every complete frame in `data`.
///
/// Returns the records and the length of the valid prefix.
pub(crate) fn decode_all(data: &[u8]) -> EngineResult<(Vec<LogRecord>, usize)> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if data.len() - offset < LEN_PREFIX {
            break;
        }
        let mut prefix = [0u8; LEN_PREFIX];
        prefix.copy_from_slice(&data[offset..offset + LEN_PREFIX]);
        let len = u32::from_le_bytes(prefix) as usize;

        let start = offset + LEN_PREFIX;
        if data.len() - start < len {
            break;
        }

        let record: LogRecord = ciborium::de::from_reader(&data[start..start + len])
            .map_err(|e| EngineError::corruption(format!("bad record at offset {offset}: {e}")))?;
        records.push(record);
        offset = start + len;
    }

    Ok((records, offset))
}

/// An append-only log file.
#[derive(Debug)]
pub(crate) struct SegmentLog {
    path: PathBuf,
    file: File,
    size: u64,
}

impl SegmentLog {
    fn open_file(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
    }

    /// Opens or creates the log and replays its records.
    pub(crate) fn open(path: &Path) -> EngineResult<(Self, Vec<LogRecord>)> {
        let file = Self::open_file(path)?;
        let data = fs::read(path)?;
        let (records, valid) = decode_all(&data)?;

        if valid < data.len() {
            warn!(
                path = %path.display(),
                dropped = data.len() - valid,
                "truncating torn tail of record log"
            );
            file.set_len(valid as u64)?;
        }

        let log = Self {
            path: path.to_path_buf(),
            file,
            size: valid as u64,
        };
        Ok((log, records))
    }

    /// Appends one record and flushes it to the OS.
    pub(crate) fn append(&mut self, record: &LogRecord) -> EngineResult<()> {
        let framed = encode(record)?;
        self.file.write_all(&framed)?;
        self.file.flush()?;
        self.size += framed.len() as u64;
        Ok(())
    }

    /// Forces data and metadata to disk.
    pub(crate) fn sync(&self) -> EngineResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Current size in bytes.
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Atomically replaces the log contents with pre-encoded frames.
    pub(crate) fn rewrite(&mut self, frames: &[Vec<u8>]) -> EngineResult<()> {
        let tmp = self.path.with_extension("log.compact");
        {
            let mut out = File::create(&tmp)?;
            for frame in frames {
                out.write_all(frame)?;
            }
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.file = Self::open_file(&self.path)?;
        self.size = frames.iter().map(|f| f.len() as u64).sum();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn put(key: &[u8], value: &[u8]) -> LogRecord {
        LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at: -1,
        }
    }

    #[test]
    fn append_and_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");

        {
            let (mut log, records) = SegmentLog::open(&path).unwrap();
            assert!(records.is_empty());
            log.append(&put(b"a", b"1")).unwrap();
            log.append(&LogRecord::Delete { key: b"a".to_vec() }).unwrap();
            log.append(&LogRecord::Batch(vec![put(b"b", b"2"), put(b"c", b"3")]))
                .unwrap();
        }

        let (log, records) = SegmentLog::open(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], put(b"a", b"1"));
        assert!(matches!(records[2], LogRecord::Batch(ref ops) if ops.len() == 2));
        assert_eq!(log.size(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn torn_tail_is_cut() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");

        {
            let (mut log, _) = SegmentLog::open(&path).unwrap();
            log.append(&put(b"a", b"1")).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();

        // Half of a second frame.
        let frame = encode(&put(b"b", b"2")).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&frame[..frame.len() / 2]).unwrap();
        drop(file);

        let (mut log, records) = SegmentLog::open(&path).unwrap();
        assert_eq!(records, vec![put(b"a", b"1")]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        log.append(&put(b"c", b"3")).unwrap();
        drop(log);
        let (_, records) = SegmentLog::open(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn garbage_frame_is_corruption() {
        let data = [3u8, 0, 0, 0, 0xff, 0xff, 0xff];
        assert!(matches!(decode_all(&data), Err(EngineError::Corruption(_))));
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");

        let (mut log, _) = SegmentLog::open(&path).unwrap();
        for i in 0..10u8 {
            log.append(&put(&[i], b"old")).unwrap();
        }

        let frames = vec![encode(&put(b"k", b"v")).unwrap()];
        log.rewrite(&frames).unwrap();
        log.append(&put(b"z", b"after")).unwrap();
        drop(log);

        let (_, records) = SegmentLog::open(&path).unwrap();
        assert_eq!(records, vec![put(b"k", b"v"), put(b"z", b"after")]);
    }
}
