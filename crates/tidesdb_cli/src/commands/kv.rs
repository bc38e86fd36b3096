//! Key-value commands. Keys and values are taken as UTF-8 text.

use super::Reply;
use tidesdb_binding::Database;

/// Stores a value.
pub fn put(db: &Database, column_family: &str, key: &str, value: &str, ttl: i64) -> Reply {
    Reply::from_result(
        db.put(column_family, key.as_bytes(), value.as_bytes(), ttl),
        |()| None,
    )
}

/// Reads a value; non-UTF-8 bytes are printed lossily.
pub fn get(db: &Database, column_family: &str, key: &str) -> Reply {
    Reply::from_result(db.get(column_family, key.as_bytes()), |value| {
        Some(String::from_utf8_lossy(&value).into_owned())
    })
}

/// Deletes a key.
pub fn delete(db: &Database, column_family: &str, key: &str) -> Reply {
    Reply::from_result(db.delete(column_family, key.as_bytes()), |()| None)
}
