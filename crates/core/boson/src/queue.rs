//! Shared pending-task list.
//!
//! A single LIFO stack guarded by one lock. The most recently enqueued task is
//! picked up first, so a chain of async commands issued by one caller tends to
//! be serviced depth-first before unrelated work.

use parking_lot::{Condvar, Mutex};

use crate::invocation::{Deps, Invocation};
use crate::wait_group::WaitGroup;

/// One queued command, owned by the queue until a single thread pops it.
pub(crate) struct Task {
    pub(crate) invocation: Invocation,
    pub(crate) deps: Deps,
    pub(crate) group: WaitGroup,
}

struct Pending {
    tasks: Vec<Task>,
    alive: bool,
}

pub(crate) struct WorkQueue {
    pending: Mutex<Pending>,
    available: Condvar,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                tasks: Vec::new(),
                alive: true,
            }),
            available: Condvar::new(),
        }
    }

    /// Push `task` on top of the stack and wake one idle worker.
    pub(crate) fn push(&self, task: Task) {
        self.pending.lock().tasks.push(task);
        self.available.notify_one();
    }

    /// Pop the newest task without blocking.
    pub(crate) fn try_pop(&self) -> Option<Task> {
        self.pending.lock().tasks.pop()
    }

    /// Pop the newest task, blocking while the queue is empty and alive.
    ///
    /// Returns `None` only after [`shutdown`](Self::shutdown) once the queue
    /// has been drained.
    pub(crate) fn next(&self) -> Option<Task> {
        let mut pending = self.pending.lock();
        loop {
            if let Some(task) = pending.tasks.pop() {
                return Some(task);
            }
            if !pending.alive {
                return None;
            }
            self.available.wait(&mut pending);
        }
    }

    /// Mark the queue dead and wake every idle worker.
    pub(crate) fn shutdown(&self) {
        self.pending.lock().alive = false;
        self.available.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().tasks.len()
    }
}
