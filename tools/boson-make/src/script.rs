//! Build script parsing.
//!
//! A build script is a TOML file with an optional `[settings]` table (a
//! [`boson::Config`]) and any number of targets. Each target is an ordered
//! list of steps; a step either runs a command or joins every async command
//! issued earlier in the same target:
//!
//! ```toml
//! [settings]
//! jobs = 4
//!
//! [target.all]
//! description = "compile and link"
//!
//! [[target.all.step]]
//! program = "cc"
//! args = ["-c", "main.c", "-o", "main.o"]
//! deps = ["main.c", "lib.h"]
//! async = true
//!
//! [[target.all.step]]
//! wait = true
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use boson::{Config, Deps, Invocation};
use serde::Deserialize;

/// Top-level build script.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Session settings.
    #[serde(default)]
    pub settings: Config,
    /// Targets by name.
    #[serde(default)]
    pub target: BTreeMap<String, Target>,
}

/// `[target.<name>]` entry.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// One-line summary shown by `boson-make targets`.
    pub description: Option<String>,
    /// Steps in execution order.
    #[serde(default)]
    pub step: Vec<Step>,
}

/// A single `[[target.<name>.step]]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Run a command.
    Command(CommandStep),
    /// Join the target's outstanding async commands.
    Wait(WaitStep),
}

/// A command step.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandStep {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Files gating the command. Absent or empty means "always run".
    #[serde(default)]
    pub deps: Vec<PathBuf>,
    /// Queue on the worker pool instead of running inline.
    #[serde(default, rename = "async")]
    pub background: bool,
}

impl CommandStep {
    /// The invocation and dependency declaration for this step.
    pub fn to_command(&self) -> (Invocation, Deps) {
        (
            Invocation::new(&self.program).args(&self.args),
            Deps::paths(self.deps.iter().cloned()),
        )
    }
}

/// A `wait = true` step.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitStep {
    pub wait: bool,
}

impl Script {
    /// Parse and validate a build script.
    pub fn parse(text: &str) -> Result<Self> {
        let script: Self = toml::from_str(text).context("invalid build script")?;
        script.validate()?;
        Ok(script)
    }

    /// Read, parse and validate the build script at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Like [`Script::load`], but a missing file yields an empty script.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Look up a target, listing the available ones on failure.
    pub fn target(&self, name: &str) -> Result<&Target> {
        match self.target.get(name) {
            Some(target) => Ok(target),
            None => {
                let known: Vec<&str> = self.target.keys().map(String::as_str).collect();
                bail!(
                    "no target named `{name}` (available: {})",
                    if known.is_empty() { "none".to_string() } else { known.join(", ") }
                )
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, target) in &self.target {
            if name.is_empty() {
                bail!("target names must not be empty");
            }
            for (i, step) in target.step.iter().enumerate() {
                if let Step::Command(cmd) = step {
                    if cmd.program.trim().is_empty() {
                        bail!("target `{name}` step {}: program must not be empty", i + 1);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boson::ExecMode;

    const SAMPLE: &str = r#"
[settings]
jobs = 2
exec = "shell"

[target.all]
description = "compile and link"

[[target.all.step]]
program = "cc"
args = ["-c", "main.c", "-o", "main.o"]
deps = ["main.c", "lib.h"]
async = true

[[target.all.step]]
program = "cc"
args = ["-c", "lib.c", "-o", "lib.o"]
deps = ["lib.c", "lib.h"]
async = true

[[target.all.step]]
wait = true

[[target.all.step]]
program = "cc"
args = ["main.o", "lib.o", "-o", "app"]
deps = ["main.o", "lib.o"]

[[target.clean.step]]
program = "rm"
args = ["-f", "main.o", "lib.o", "app"]
"#;

    #[test]
    fn sample_script_parses() {
        let script = Script::parse(SAMPLE).unwrap();
        assert_eq!(script.settings.jobs, 2);
        assert_eq!(script.settings.exec, ExecMode::Shell);
        assert_eq!(script.target.len(), 2);

        let all = script.target("all").unwrap();
        assert_eq!(all.description.as_deref(), Some("compile and link"));
        assert_eq!(all.step.len(), 4);
        assert!(matches!(&all.step[0], Step::Command(c) if c.background));
        assert!(matches!(&all.step[2], Step::Wait(WaitStep { wait: true })));
        assert!(matches!(&all.step[3], Step::Command(c) if !c.background));
    }

    #[test]
    fn command_step_builds_invocation() {
        let script = Script::parse(SAMPLE).unwrap();
        let Step::Command(step) = &script.target("all").unwrap().step[0] else {
            panic!("first step should be a command");
        };
        let (invocation, deps) = step.to_command();
        assert_eq!(invocation.key(), "cc -c main.c -o main.o");
        assert_eq!(deps, Deps::paths(["main.c", "lib.h"]));
    }

    #[test]
    fn missing_deps_always_run() {
        let script = Script::parse(SAMPLE).unwrap();
        let Step::Command(step) = &script.target("clean").unwrap().step[0] else {
            panic!("clean step should be a command");
        };
        assert_eq!(step.to_command().1, Deps::None);
    }

    #[test]
    fn empty_script_has_defaults() {
        let script = Script::parse("").unwrap();
        assert_eq!(script.settings, Config::default());
        assert!(script.target.is_empty());
    }

    #[test]
    fn unknown_target_lists_available() {
        let script = Script::parse(SAMPLE).unwrap();
        let err = script.target("install").unwrap_err().to_string();
        assert!(err.contains("all, clean"), "{err}");
    }

    #[test]
    fn empty_program_is_rejected() {
        let err = Script::parse("[[target.x.step]]\nprogram = \"\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("program must not be empty"), "{err:#}");
    }

    #[test]
    fn unknown_settings_key_is_rejected() {
        assert!(Script::parse("[settings]\nworkers = 3\n").is_err());
    }

    #[test]
    fn step_with_neither_program_nor_wait_is_rejected() {
        assert!(Script::parse("[[target.x.step]]\nargs = [\"a\"]\n").is_err());
    }
}
