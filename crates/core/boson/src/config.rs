//! Session configuration.
//!
//! Usually embedded in a build script as a TOML table:
//!
//! ```toml
//! jobs = 4
//! ledger = "build/.boson-ledger"
//! exec = "shell"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::exec::ExecMode;

/// Default location of the ledger store, relative to the working directory.
pub const DEFAULT_LEDGER: &str = ".boson-ledger";

/// Settings for a [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Number of dedicated worker threads (0 = one per available CPU).
    pub jobs: usize,
    /// Path of the persisted ledger store.
    pub ledger: PathBuf,
    /// How commands are turned into processes.
    pub exec: ExecMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 0,
            ledger: PathBuf::from(DEFAULT_LEDGER),
            exec: ExecMode::Direct,
        }
    }
}

impl Config {
    /// Parse a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML, unknown keys, or mistyped values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve `jobs` into an actual thread count.
    pub fn worker_count(&self) -> usize {
        match self.jobs {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            n => n,
        }
    }
}
