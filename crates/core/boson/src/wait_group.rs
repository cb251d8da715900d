//! Completion counter for a dynamic set of asynchronous commands.
//!
//! A [`WaitGroup`] is incremented once per command enqueued against it and
//! decremented once per command that finishes (or is discarded after the
//! session aborted). It is joined with [`Session::wait`], which keeps
//! executing queued work while the counter is non-zero.
//!
//! [`Session::wait`]: crate::Session::wait

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter of outstanding commands.
///
/// Clones refer to the same counter.
#[derive(Clone, Debug, Default)]
pub struct WaitGroup {
    counter: Arc<AtomicUsize>,
}

impl WaitGroup {
    /// Create a group with no outstanding commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands still outstanding.
    pub fn pending(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    /// Returns `true` once every command spawned against the group finished.
    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }

    pub(crate) fn add(&self, n: usize) {
        self.counter.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn done(&self) {
        let prev = self.counter.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "wait group counter underflow");
    }
}
