//! The build session: ledger, worker pool and executor behind one handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::error::Result;
use crate::exec::{Executor, ProcessExecutor};
use crate::invocation::{Deps, Invocation};
use crate::ledger::Ledger;
use crate::pool::{Shared, WorkerPool};
use crate::queue::{Task, WorkQueue};
use crate::runner::{Outcome, Runner};
use crate::wait_group::WaitGroup;

/// A running build.
///
/// [`Session::open`] loads the ledger and starts the worker pool;
/// [`Session::close`] stops the pool and persists the ledger. A session can
/// be shared by reference between threads, each of which may issue commands
/// and join wait groups.
pub struct Session {
    shared: Arc<Shared>,
    pool: Option<WorkerPool>,
    ledger_path: PathBuf,
}

impl Session {
    /// Open a session that spawns real processes.
    ///
    /// # Errors
    ///
    /// Fails if the ledger cannot be loaded or the workers cannot start.
    pub fn open(config: &Config) -> Result<Self> {
        Self::with_executor(config, ProcessExecutor::new(config.exec))
    }

    /// Open a session that runs commands through `executor`.
    ///
    /// # Errors
    ///
    /// Fails if the ledger cannot be loaded or the workers cannot start.
    pub fn with_executor(config: &Config, executor: impl Executor + 'static) -> Result<Self> {
        let ledger = Ledger::load(&config.ledger)?;
        let shared = Arc::new(Shared {
            runner: Runner::new(ledger, Box::new(executor)),
            queue: WorkQueue::new(),
        });
        let pool = WorkerPool::spawn(config.worker_count(), &shared)?;
        Ok(Self {
            shared,
            pool: Some(pool),
            ledger_path: config.ledger.clone(),
        })
    }

    /// Run a command on the calling thread.
    ///
    /// Commands with dependencies run only if a dependency is missing or
    /// newer than the last recorded success; commands with [`Deps::None`]
    /// always run.
    ///
    /// # Errors
    ///
    /// Fails if the command fails (which aborts the session) or if the
    /// session was already aborted.
    pub fn run(&self, invocation: Invocation, deps: Deps) -> Result<Outcome> {
        self.shared.runner.run(invocation, deps)
    }

    /// Queue a command for the worker pool and count it against `group`.
    ///
    /// # Errors
    ///
    /// Fails without queueing anything if the session was already aborted
    /// or the program name is empty.
    pub fn run_async(&self, group: &WaitGroup, invocation: Invocation, deps: Deps) -> Result<()> {
        self.shared.runner.admit(&invocation)?;
        group.add(1);
        self.shared.queue.push(Task {
            invocation,
            deps,
            group: group.clone(),
        });
        Ok(())
    }

    /// Execute at most one queued command on the calling thread.
    ///
    /// Returns `true` if a command was taken from the queue.
    pub fn assist(&self) -> bool {
        self.shared.assist()
    }

    /// Block until every command queued against `group` has finished.
    ///
    /// The calling thread keeps executing queued commands while it waits, so
    /// progress does not depend on the number of workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`](crate::Error::Aborted) if any command in
    /// the session failed.
    pub fn wait(&self, group: &WaitGroup) -> Result<()> {
        while !group.is_done() {
            if !self.assist() {
                thread::yield_now();
            }
        }
        self.shared.runner.check_live()
    }

    /// The session's ledger.
    pub fn ledger(&self) -> &Ledger {
        self.shared.runner.ledger()
    }

    /// Where the ledger is persisted on [`close`](Self::close).
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Number of dedicated worker threads.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::len)
    }

    /// Stop the workers, then persist the ledger.
    ///
    /// Commands still queued are drained by the workers before they exit.
    /// The ledger is written even if the build aborted, so successful
    /// commands are not repeated next time.
    ///
    /// # Errors
    ///
    /// Fails if a worker panicked or the ledger cannot be written.
    pub fn close(mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            self.shared.queue.shutdown();
            pool.join()?;
        }
        self.ledger().save(&self.ledger_path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.shared.queue.shutdown();
            match pool.join() {
                Ok(()) => tracing::warn!(
                    "session dropped without close; ledger {} not saved",
                    self.ledger_path.display()
                ),
                Err(err) => tracing::warn!(
                    "session dropped without close; ledger {} not saved: {err}",
                    self.ledger_path.display()
                ),
            }
        }
    }
}
