//! Conversion of host time-to-live values into absolute expiry times.

use std::time::{SystemTime, UNIX_EPOCH};

/// TTL value meaning "never expires". Passed to the engine unchanged.
pub const NO_EXPIRY: i64 = tidesdb_engine::NO_EXPIRY;

/// Converts a relative TTL in seconds into an absolute Unix timestamp.
pub fn absolute_expiry(ttl: i64) -> i64 {
    absolute_expiry_at(ttl, now_unix())
}

/// Converts a relative TTL against an explicit clock reading.
///
/// Other negative values give a time in the past, so the entry is expired
/// as soon as it is written. Results are clamped at 0 so that no relative
/// TTL ever lands on [`NO_EXPIRY`].
pub fn absolute_expiry_at(ttl: i64, now: i64) -> i64 {
    if ttl == NO_EXPIRY {
        NO_EXPIRY
    } else {
        now.saturating_add(ttl).max(0)
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
