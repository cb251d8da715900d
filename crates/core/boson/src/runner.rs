//! Ledger-gated command execution.
//!
//! Turns one `(invocation, deps)` pair into at most one process run. Commands
//! with dependencies consult the [`Ledger`] and record their success; commands
//! without dependencies always run. The first failure aborts the runner: every
//! later call reports [`Error::Aborted`] without executing anything.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::invocation::{Deps, Invocation};
use crate::ledger::Ledger;

/// What [`Session::run`](crate::Session::run) did with a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The command was executed and exited successfully.
    Executed,
    /// Every dependency was older than the last recorded success.
    UpToDate,
}

pub(crate) struct Runner {
    ledger: Ledger,
    executor: Box<dyn Executor>,
    failure: OnceLock<String>,
}

/// A claimed ledger key. Released as failed unless [`Claim::succeed`] is called.
struct Claim<'a> {
    ledger: &'a Ledger,
    key: &'a str,
    settled: bool,
}

impl Claim<'_> {
    fn succeed(mut self) {
        self.ledger.record_success(self.key);
        self.settled = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.record_failure(self.key);
        }
    }
}

impl Runner {
    pub(crate) fn new(ledger: Ledger, executor: Box<dyn Executor>) -> Self {
        Self {
            ledger,
            executor,
            failure: OnceLock::new(),
        }
    }

    pub(crate) fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Fails with [`Error::Aborted`] once any command has failed.
    pub(crate) fn check_live(&self) -> Result<()> {
        match self.failure.get() {
            Some(cause) => Err(Error::Aborted {
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Reject work that can never run.
    pub(crate) fn admit(&self, invocation: &Invocation) -> Result<()> {
        self.check_live()?;
        if invocation.program().is_empty() {
            return Err(Error::EmptyProgram);
        }
        Ok(())
    }

    pub(crate) fn run(&self, invocation: Invocation, deps: Deps) -> Result<Outcome> {
        self.admit(&invocation)?;
        let key = invocation.key();

        let claim = match deps.as_paths() {
            None => None,
            Some(paths) => {
                if !self.ledger.should_run_any(&key, paths) {
                    tracing::debug!("  up to date: {key}");
                    return Ok(Outcome::UpToDate);
                }
                let claim = Claim {
                    ledger: &self.ledger,
                    key: &key,
                    settled: false,
                };
                // Another command may have failed while we waited on the key.
                self.check_live()?;
                Some(claim)
            }
        };

        tracing::info!("running `{key}`");
        if let Err(err) = self.executor.execute(&invocation) {
            self.abort(&err);
            return Err(err);
        }
        if let Some(claim) = claim {
            claim.succeed();
        }
        Ok(Outcome::Executed)
    }

    /// Record `err` as the session's failure unless one is already set.
    pub(crate) fn abort(&self, err: &Error) {
        if self.failure.set(err.to_string()).is_ok() {
            tracing::debug!("aborting build after first failure");
        }
    }
}
