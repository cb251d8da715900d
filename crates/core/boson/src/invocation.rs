//! Program invocations and their declared dependencies.

use std::fmt;
use std::path::PathBuf;

/// A program plus its ordered argument vector.
///
/// The ledger key of an invocation is the program and arguments joined by
/// single spaces, exactly as written. Arguments are never escaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The ledger key: program and arguments joined by spaces.
    pub fn key(&self) -> String {
        let mut key = self.program.clone();
        for arg in &self.args {
            key.push(' ');
            key.push_str(arg);
        }
        key
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Dependency declaration for a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Deps {
    /// No dependencies: the command always runs and is never recorded.
    #[default]
    None,
    /// Files whose modification times gate the command.
    Paths(Vec<PathBuf>),
}

impl Deps {
    /// Declare dependency files. An empty list is the same as [`Deps::None`].
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            Self::None
        } else {
            Self::Paths(paths)
        }
    }

    /// The gating files, or `None` when the command always runs.
    pub fn as_paths(&self) -> Option<&[PathBuf]> {
        match self {
            Self::Paths(paths) if !paths.is_empty() => Some(paths),
            _ => None,
        }
    }
}
