//! boson build-script runner.
//!
//! Loads `boson.toml`, opens a [`boson::Session`] with the script's settings
//! (overridden by CLI flags), and runs the requested target. The ledger is
//! persisted when the session closes, even after a failed build.

mod cli;
mod run;
mod script;
mod verbose;

use anyhow::{Context, Result};
use boson::{Config, ExecMode, Ledger, Session};
use clap::Parser;
use serde::Serialize;

use script::Script;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(verbose::Verbosity::from_flags(cli.quiet, cli.verbose));

    match cli.command {
        cli::Command::Build(ref args) => cmd_build(&cli, &args.target),
        cli::Command::Targets => cmd_targets(&cli),
        cli::Command::Ledger(ref args) => cmd_ledger(&cli, args.json),
        cli::Command::Forget => cmd_forget(&cli),
    }
}

/// Apply CLI overrides on top of the script's `[settings]`.
fn resolve_config(cli: &cli::Cli, script: &Script) -> Config {
    let mut config = script.settings.clone();
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    if let Some(ref ledger) = cli.ledger {
        config.ledger.clone_from(ledger);
    }
    if cli.shell {
        config.exec = ExecMode::Shell;
    }
    config
}

// ===========================================================================
// Commands
// ===========================================================================

/// Run one target of the build script.
fn cmd_build(cli: &cli::Cli, target_name: &str) -> Result<()> {
    let script = Script::load(&cli.file)?;
    let target = script.target(target_name)?;
    let config = resolve_config(cli, &script);

    let session = Session::open(&config).context("failed to start build session")?;
    tracing::debug!(
        "  {} workers, ledger {}",
        session.workers(),
        session.ledger_path().display()
    );

    let result = {
        let _t = verbose::Timer::start(format!("target {target_name}"));
        run::run_target(&session, target)
    };
    let closed = session.close();
    let summary = result.with_context(|| format!("target `{target_name}` failed"))?;
    closed.context("failed to finish build session")?;

    println!(
        "Finished `{target_name}`: {} run, {} up to date, {} queued",
        summary.executed, summary.up_to_date, summary.queued
    );
    Ok(())
}

/// List the targets in the build script.
fn cmd_targets(cli: &cli::Cli) -> Result<()> {
    let script = Script::load(&cli.file)?;
    if script.target.is_empty() {
        println!("No targets defined in {}.", cli.file.display());
        return Ok(());
    }
    let width = script.target.keys().map(String::len).max().unwrap_or(0);
    for (name, target) in &script.target {
        let steps = target.step.len();
        match target.description {
            Some(ref desc) => println!("  {name:width$}  {desc} ({steps} steps)"),
            None => println!("  {name:width$}  ({steps} steps)"),
        }
    }
    Ok(())
}

/// One ledger entry in `--json` output.
#[derive(Serialize)]
struct LedgerRow<'a> {
    key: &'a str,
    last_success: Option<u64>,
}

/// Print the recorded ledger entries.
fn cmd_ledger(cli: &cli::Cli, json: bool) -> Result<()> {
    let script = Script::load_or_default(&cli.file)?;
    let config = resolve_config(cli, &script);
    let ledger = Ledger::load(&config.ledger)?;
    let records = ledger.records();

    if json {
        let rows: Vec<LedgerRow<'_>> = records
            .iter()
            .map(|r| LedgerRow {
                key: &r.key,
                last_success: r.last_success,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for record in &records {
        match record.last_success {
            Some(stamp) => println!("  {stamp:>10}  {}", record.key),
            None => println!("  {:>10}  {}", "-", record.key),
        }
    }
    println!("{} entries in {}", records.len(), config.ledger.display());
    Ok(())
}

/// Delete the ledger store.
fn cmd_forget(cli: &cli::Cli) -> Result<()> {
    let script = Script::load_or_default(&cli.file)?;
    let config = resolve_config(cli, &script);
    if config.ledger.exists() {
        std::fs::remove_file(&config.ledger)
            .with_context(|| format!("failed to remove {}", config.ledger.display()))?;
        println!("Removed {}.", config.ledger.display());
    } else {
        println!("Nothing to remove ({} does not exist).", config.ledger.display());
    }
    Ok(())
}
