//! Heap buffers and strings handed to the caller.

use crate::stats;
use std::ffi::{c_char, CString};

/// Moves a byte vector onto the heap for the caller.
///
/// Release with [`tidesdb_free_buffer`] using the returned length.
pub(crate) fn into_raw_buffer(data: Vec<u8>) -> (*mut u8, usize) {
    let boxed = data.into_boxed_slice();
    let len = boxed.len();
    stats::record_buffer_allocated();
    (Box::into_raw(boxed).cast::<u8>(), len)
}

/// Moves a string onto the heap as a null-terminated C string.
///
/// Release with [`tidesdb_free_string`].
pub(crate) fn into_raw_string(s: &str) -> *mut c_char {
    let cstring = CString::new(s.replace('\0', " ")).unwrap_or_default();
    stats::record_buffer_allocated();
    cstring.into_raw()
}

/// Frees a value buffer returned by the engine.
///
/// # Safety
///
/// `data` must be null or a pointer returned by an engine read call, and
/// `len` must be the length reported alongside it.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_free_buffer(data: *mut u8, len: usize) {
    if data.is_null() {
        return;
    }
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, len)));
    stats::record_buffer_freed();
}

/// Frees a string returned by the engine.
///
/// # Safety
///
/// `string` must be null or a pointer returned by an engine listing call.
#[no_mangle]
pub unsafe extern "C" fn tidesdb_free_string(string: *mut c_char) {
    if string.is_null() {
        return;
    }
    drop(CString::from_raw(string));
    stats::record_buffer_freed();
}
