//! Target execution.

use anyhow::Result;
use boson::{Outcome, Session, WaitGroup};

use crate::script::{Step, Target};

/// Counts reported after a target finishes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Inline commands that ran.
    pub executed: usize,
    /// Inline commands skipped as up to date.
    pub up_to_date: usize,
    /// Commands handed to the worker pool.
    pub queued: usize,
}

/// Run every step of `target` in order, then join its async commands.
///
/// Async commands share one wait group per target; a `wait` step joins it
/// before continuing.
pub fn run_target(session: &Session, target: &Target) -> Result<Summary> {
    let group = WaitGroup::new();
    let mut summary = Summary::default();

    for step in &target.step {
        match step {
            Step::Command(cmd) => {
                let (invocation, deps) = cmd.to_command();
                if cmd.background {
                    session.run_async(&group, invocation, deps)?;
                    summary.queued += 1;
                } else {
                    match session.run(invocation, deps)? {
                        Outcome::Executed => summary.executed += 1,
                        Outcome::UpToDate => summary.up_to_date += 1,
                    }
                }
            }
            Step::Wait(wait) if wait.wait => session.wait(&group)?,
            Step::Wait(_) => {}
        }
    }

    session.wait(&group)?;
    Ok(summary)
}
