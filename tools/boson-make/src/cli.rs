//! Command-line interface definitions for boson-make.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parallel, incremental build-script runner.
#[derive(Parser)]
#[command(name = "boson-make", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Build script to load.
    #[arg(long, short = 'f', global = true, default_value = "boson.toml")]
    pub file: PathBuf,

    /// Suppress per-command output; show only errors and the final summary.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with skip reasons and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Number of worker threads (0 = auto-detect from CPU count).
    #[arg(long, short = 'j', global = true)]
    pub jobs: Option<usize>,

    /// Ledger store location (overrides the script's settings).
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Run commands through the platform shell instead of spawning them directly.
    #[arg(long, global = true)]
    pub shell: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run a target from the build script.
    Build(BuildArgs),
    /// List the targets defined by the build script.
    Targets,
    /// Show the recorded ledger entries.
    Ledger(LedgerArgs),
    /// Delete the ledger store so every command runs again.
    Forget,
}

/// Arguments for the `build` subcommand.
#[derive(Parser)]
pub struct BuildArgs {
    /// Target to run.
    #[arg(default_value = "all")]
    pub target: String,
}

/// Arguments for the `ledger` subcommand.
#[derive(Parser)]
pub struct LedgerArgs {
    /// Print entries as JSON.
    #[arg(long)]
    pub json: bool,
}
