//! Type definitions for the C API.

use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque database handle.
///
/// This is a pointer to the internal engine structure.
/// Never dereference or modify directly.
#[repr(C)]
pub struct TidesDbHandle {
    _private: [u8; 0],
}

/// An opaque transaction handle.
#[repr(C)]
pub struct TidesDbTransaction {
    _private: [u8; 0],
}

/// Expiry sentinel: the entry never expires.
pub const NO_EXPIRY: i64 = -1;

/// Current wall-clock time in whole seconds since the Unix epoch.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Returns true if an entry with the given absolute expiry is dead at `now`.
pub(crate) fn is_expired(expires_at: i64, now: i64) -> bool {
    expires_at != NO_EXPIRY && now > expires_at
}
