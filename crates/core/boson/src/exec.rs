//! Process execution.
//!
//! The [`Executor`] trait is the seam between scheduling and actually running
//! something. [`ProcessExecutor`] spawns real processes with inherited stdio.

use std::process::Command;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::invocation::Invocation;

/// How [`ProcessExecutor`] turns an invocation into a process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Spawn the program directly with its argument vector. No shell is
    /// involved, so globs, redirects and quoting are not interpreted.
    #[default]
    Direct,
    /// Hand the joined invocation string to the platform shell
    /// (`sh -c` or `cmd /C`), which interprets it literally.
    Shell,
}

/// Runs one invocation to completion.
pub trait Executor: Send + Sync {
    /// Execute `invocation`, returning `Ok(())` only on a successful exit.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`] if the process could not be started,
    /// [`Error::CommandFailed`] if it exited unsuccessfully.
    fn execute(&self, invocation: &Invocation) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute(&self, invocation: &Invocation) -> Result<()> {
        (**self).execute(invocation)
    }
}

/// Spawns real processes, inheriting stdin, stdout and stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor {
    mode: ExecMode,
}

impl ProcessExecutor {
    /// Create an executor using the given mode.
    pub fn new(mode: ExecMode) -> Self {
        Self { mode }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        match self.mode {
            ExecMode::Direct => {
                let mut cmd = Command::new(invocation.program());
                cmd.args(invocation.arguments());
                cmd
            }
            ExecMode::Shell if cfg!(windows) => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(invocation.key());
                cmd
            }
            ExecMode::Shell => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(invocation.key());
                cmd
            }
        }
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<()> {
        let status = self
            .command(invocation)
            .status()
            .map_err(|source| Error::Spawn {
                invocation: invocation.key(),
                source,
            })?;

        if !status.success() {
            return Err(Error::CommandFailed {
                invocation: invocation.key(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn direct_success() {
        let exec = ProcessExecutor::new(ExecMode::Direct);
        exec.execute(&Invocation::new("true")).unwrap();
    }

    #[test]
    fn direct_non_zero_exit_fails() {
        let exec = ProcessExecutor::new(ExecMode::Direct);
        let err = exec.execute(&Invocation::new("false")).unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref invocation, .. } if invocation == "false"));
    }

    #[test]
    fn direct_missing_program_fails_to_spawn() {
        let exec = ProcessExecutor::default();
        let err = exec
            .execute(&Invocation::new("boson-definitely-not-a-program"))
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }), "{err}");
    }

    #[test]
    fn direct_does_not_interpret_shell_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let exec = ProcessExecutor::new(ExecMode::Direct);
        exec.execute(&Invocation::new("echo").args([">", target.to_str().unwrap()]))
            .unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn shell_mode_interprets_the_joined_string() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let exec = ProcessExecutor::new(ExecMode::Shell);
        exec.execute(&Invocation::new("echo").args(["hi", ">", target.to_str().unwrap()]))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi\n");
    }
}
