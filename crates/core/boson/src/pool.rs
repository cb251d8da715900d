//! Fixed-size worker pool draining the shared work queue.
//!
//! Workers and assisting threads execute tasks identically: run the command
//! through the [`Runner`], then mark the task's wait group done. Once the build
//! has aborted, queued tasks are still popped and counted down, but not run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::queue::{Task, WorkQueue};
use crate::runner::Runner;

/// State shared between a session and its workers.
pub(crate) struct Shared {
    pub(crate) runner: Runner,
    pub(crate) queue: WorkQueue,
}

impl Shared {
    /// Execute at most one pending task on the calling thread.
    pub(crate) fn assist(&self) -> bool {
        match self.queue.try_pop() {
            Some(task) => {
                self.execute(task);
                true
            }
            None => false,
        }
    }

    /// Run `task` and count it down, even if the executor panics.
    ///
    /// A panic is caught so the thread survives; it aborts the session like
    /// any other failed command.
    fn execute(&self, task: Task) {
        let Task {
            invocation,
            deps,
            group,
        } = task;
        let key = invocation.key();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(invocation, deps)))
            .unwrap_or_else(|_| {
                let err = Error::CommandPanicked { invocation: key };
                self.runner.abort(&err);
                Err(err)
            });
        match result {
            Ok(_) => {}
            Err(Error::Aborted { .. }) => {
                tracing::debug!("  discarded queued command (build aborted)");
            }
            Err(err) => tracing::error!("{err}"),
        }
        group.done();
    }
}

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` workers on `shared`.
    ///
    /// If any thread fails to start, the ones already running are stopped
    /// before the error is returned.
    pub(crate) fn spawn(count: usize, shared: &Arc<Shared>) -> Result<Self> {
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let worker_shared = Arc::clone(shared);
            let spawned = thread::Builder::new()
                .name(format!("boson-worker-{i}"))
                .spawn(move || worker_loop(&worker_shared));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shared.queue.shutdown();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(Error::WorkerSpawn(e));
                }
            }
        }
        tracing::debug!("started {count} workers");
        Ok(Self { handles })
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. The queue must already be shut down.
    pub(crate) fn join(self) -> Result<()> {
        let mut panicked = false;
        for handle in self.handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(Error::WorkerPanicked);
        }
        Ok(())
    }
}

fn worker_loop(shared: &Shared) {
    while let Some(task) = shared.queue.next() {
        shared.execute(task);
    }
    tracing::trace!("{} exiting", thread::current().name().unwrap_or("worker"));
}
