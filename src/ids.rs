//! Per-run generator for unique statement, bind, error and frame IDs.
//!
//! Every [`TraceRun`](crate::run::TraceRun) owns one allocator, and every
//! constructor that needs an ID takes it by reference. Two runs processed on
//! different threads therefore never share counters, and IDs restart at 1
//! for each run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sequential ID source for the records produced by one trace run.
#[derive(Debug)]
pub struct IdAllocator {
    next_statement: AtomicU64,
    next_bind: AtomicU64,
    next_error: AtomicU64,
    next_frame: AtomicU64,
    next_stack_trace: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator with every counter starting at 1.
    pub fn new() -> Self {
        Self {
            next_statement: AtomicU64::new(1),
            next_bind: AtomicU64::new(1),
            next_error: AtomicU64::new(1),
            next_frame: AtomicU64::new(1),
            next_stack_trace: AtomicU64::new(1),
        }
    }

    pub fn next_statement_id(&self) -> u64 {
        self.next_statement.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_bind_id(&self) -> u64 {
        self.next_bind.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_error_id(&self) -> u64 {
        self.next_error.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_frame_id(&self) -> u64 {
        self.next_frame.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_stack_trace_id(&self) -> u64 {
        self.next_stack_trace.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
