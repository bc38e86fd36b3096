//! Allocation tracking for objects handed across the C boundary.
//!
//! Counters are per thread: every engine call allocates and the caller
//! releases on the calling thread, so a thread's counters describe exactly
//! the calls it made.

use std::cell::Cell;

thread_local! {
    static ERRORS_ALLOCATED: Cell<u64> = const { Cell::new(0) };
    static ERRORS_FREED: Cell<u64> = const { Cell::new(0) };
    static BUFFERS_ALLOCATED: Cell<u64> = const { Cell::new(0) };
    static BUFFERS_FREED: Cell<u64> = const { Cell::new(0) };
}

/// Snapshot of the calling thread's allocation counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidesDbAllocStats {
    /// Error objects handed out.
    pub errors_allocated: u64,
    /// Error objects released through `tidesdb_err_free`.
    pub errors_freed: u64,
    /// Value buffers and strings handed out.
    pub buffers_allocated: u64,
    /// Value buffers and strings released.
    pub buffers_freed: u64,
}

impl TidesDbAllocStats {
    /// Error objects allocated but not yet released.
    pub fn outstanding_errors(&self) -> u64 {
        self.errors_allocated.saturating_sub(self.errors_freed)
    }

    /// Buffers allocated but not yet released.
    pub fn outstanding_buffers(&self) -> u64 {
        self.buffers_allocated.saturating_sub(self.buffers_freed)
    }
}

fn bump(counter: &'static std::thread::LocalKey<Cell<u64>>) {
    counter.with(|c| c.set(c.get() + 1));
}

pub(crate) fn record_error_allocated() {
    bump(&ERRORS_ALLOCATED);
}

pub(crate) fn record_error_freed() {
    bump(&ERRORS_FREED);
}

pub(crate) fn record_buffer_allocated() {
    bump(&BUFFERS_ALLOCATED);
}

pub(crate) fn record_buffer_freed() {
    bump(&BUFFERS_FREED);
}

/// Returns the calling thread's allocation counters.
#[no_mangle]
pub extern "C" fn tidesdb_alloc_stats() -> TidesDbAllocStats {
    TidesDbAllocStats {
        errors_allocated: ERRORS_ALLOCATED.with(Cell::get),
        errors_freed: ERRORS_FREED.with(Cell::get),
        buffers_allocated: BUFFERS_ALLOCATED.with(Cell::get),
        buffers_freed: BUFFERS_FREED.with(Cell::get),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_this_thread() {
        let before = tidesdb_alloc_stats();
        record_error_allocated();
        record_buffer_allocated();
        let stats = tidesdb_alloc_stats();
        assert_eq!(stats.outstanding_errors(), before.outstanding_errors() + 1);
        assert_eq!(stats.outstanding_buffers(), before.outstanding_buffers() + 1);

        record_error_freed();
        record_buffer_freed();
        let stats = tidesdb_alloc_stats();
        assert_eq!(stats.outstanding_errors(), before.outstanding_errors());
        assert_eq!(stats.outstanding_buffers(), before.outstanding_buffers());
    }
}
