//! Copying engine-owned results into Rust-owned values.
//!
//! Buffers and strings returned by read calls belong to the engine until
//! released. The guards here copy the contents out first and release the
//! engine allocation on drop, so a copy never reads freed memory and an
//! early return never leaks.

use crate::status::{BindingResult, Status};
use std::ffi::{c_char, CStr, CString};
use tidesdb_engine::{tidesdb_free_buffer, tidesdb_free_string};

/// A value buffer owned by the engine.
struct EngineBuffer {
    ptr: *mut u8,
    len: usize,
}

impl EngineBuffer {
    fn to_vec(&self) -> Vec<u8> {
        if self.ptr.is_null() || self.len == 0 {
            return Vec::new();
        }
        // SAFETY: the engine reported `len` valid bytes at `ptr`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }.to_vec()
    }
}

impl Drop for EngineBuffer {
    fn drop(&mut self) {
        // SAFETY: this guard is the only owner; null is accepted.
        unsafe { tidesdb_free_buffer(self.ptr, self.len) };
    }
}

/// A null-terminated string owned by the engine.
struct EngineString(*mut c_char);

impl EngineString {
    fn to_string_lossy(&self) -> String {
        if self.0.is_null() {
            return String::new();
        }
        // SAFETY: the engine returned a valid null-terminated string.
        unsafe { CStr::from_ptr(self.0) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for EngineString {
    fn drop(&mut self) {
        // SAFETY: this guard is the only owner; null is accepted.
        unsafe { tidesdb_free_string(self.0) };
    }
}

/// Copies a value buffer and releases it.
///
/// A null pointer yields an empty value.
///
/// # Safety
///
/// `ptr` must be null or a buffer returned by a successful engine read with
/// length `len`, not yet released.
pub(crate) unsafe fn take_buffer(ptr: *mut u8, len: usize) -> Vec<u8> {
    EngineBuffer { ptr, len }.to_vec()
}

/// Copies a string and releases it.
///
/// # Safety
///
/// `ptr` must be null or a string returned by a successful engine call, not
/// yet released.
pub(crate) unsafe fn take_string(ptr: *mut c_char) -> String {
    EngineString(ptr).to_string_lossy()
}

/// Converts a host string argument into a C string.
pub(crate) fn c_string(value: &str, what: &str) -> BindingResult<CString> {
    CString::new(value)
        .map_err(|_| Status::invalid_argument(format!("{what} contains a NUL byte")))
}
