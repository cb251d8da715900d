//! Error types for boson.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while scheduling or running commands.
#[derive(Debug, Error)]
pub enum Error {
    /// The ledger store exists but could not be read.
    #[error("could not read ledger {}: {source}", path.display())]
    LedgerRead {
        /// Location of the ledger store.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The ledger store could not be written back.
    #[error("could not write ledger {}: {source}", path.display())]
    LedgerWrite {
        /// Location of the ledger store.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A ledger line is not of the form `<key> <unix-seconds>`.
    #[error("malformed ledger line {line}: {content:?}")]
    MalformedLedger {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// An invocation was issued with an empty program name.
    #[error("command has an empty program name")]
    EmptyProgram,

    /// The process could not be started at all.
    #[error("could not start `{invocation}`: {source}")]
    Spawn {
        /// The invocation string.
        invocation: String,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("command `{invocation}` exited with {status}")]
    CommandFailed {
        /// The invocation string.
        invocation: String,
        /// Human-readable exit status.
        status: String,
    },

    /// The executor panicked while running a queued command.
    #[error("command `{invocation}` panicked")]
    CommandPanicked {
        /// The invocation string.
        invocation: String,
    },

    /// An earlier failure stopped the session; nothing else will run.
    #[error("build aborted: {cause}")]
    Aborted {
        /// Message of the failure that aborted the session.
        cause: String,
    },

    /// A worker thread could not be started.
    #[error("could not start worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// A worker thread panicked before it could be joined.
    #[error("worker thread panicked")]
    WorkerPanicked,

    /// A configuration file could not be read.
    #[error("could not read config {}: {source}", path.display())]
    ConfigRead {
        /// Location of the config file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A configuration document is not valid.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result alias used throughout boson.
pub type Result<T> = std::result::Result<T, Error>;
