//! Translation of engine error objects into owned statuses.
//!
//! Every engine call returns either null or a heap-owned `TidesDbError`.
//! [`check`] copies the code and message out and releases the object before
//! returning, so no error object ever outlives the call that produced it.

use crate::status::{BindingResult, Status};
use std::ffi::CStr;
use std::ptr::NonNull;
use tidesdb_engine::{tidesdb_err_free, TidesDbError};

/// Owns one engine error object and releases it on drop.
struct ErrorEnvelope(NonNull<TidesDbError>);

impl ErrorEnvelope {
    fn to_status(&self) -> Status {
        // SAFETY: the pointer came from the engine and is released only in drop.
        let raw = unsafe { self.0.as_ref() };
        let message = if raw.message.is_null() {
            String::new()
        } else {
            // SAFETY: the engine guarantees a valid null-terminated message.
            unsafe { CStr::from_ptr(raw.message) }
                .to_string_lossy()
                .into_owned()
        };
        Status::new(raw.code, message)
    }
}

impl Drop for ErrorEnvelope {
    fn drop(&mut self) {
        // SAFETY: the envelope is the only owner of the error object.
        unsafe { tidesdb_err_free(self.0.as_ptr()) };
    }
}

/// Turns the return value of an engine call into a result.
///
/// Null means success. Otherwise the error object is read into a [`Status`]
/// and released exactly once, on every exit path.
///
/// # Safety
///
/// `raw` must be null or an error object freshly returned by the engine and
/// not yet released.
pub(crate) unsafe fn check(raw: *mut TidesDbError) -> BindingResult<()> {
    match NonNull::new(raw) {
        None => Ok(()),
        Some(ptr) => {
            let envelope = ErrorEnvelope(ptr);
            Err(envelope.to_status())
        }
    }
}
