//! Compact command implementation.

use super::Reply;
use std::time::Instant;
use tidesdb_binding::Database;
use tracing::info;

/// Compacts a column family, blocking until the engine finishes.
pub fn run(db: &Database, column_family: &str, threads: i32) -> Reply {
    let started = Instant::now();
    let result = db.compact_sstables(column_family, threads);
    if result.is_ok() {
        info!(
            column_family,
            threads,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "compaction complete"
        );
    }
    Reply::from_result(result, |()| None)
}
