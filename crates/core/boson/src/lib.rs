//! Parallel, incremental command orchestration for build scripts.
//!
//! A build script describes work as commands: a program, its arguments, and
//! the files the command depends on. A [`Session`] decides whether each
//! command needs to run by comparing dependency modification times with the
//! last recorded success in its [`Ledger`], runs independent commands on a
//! fixed worker pool, and persists the ledger so the next run skips
//! up-to-date work.
//!
//! The caller sequences commands itself: issue a batch with
//! [`Session::run_async`], join it with [`Session::wait`], then continue with
//! whatever depends on it.
//!
//! ```ignore
//! let session = Session::open(&Config::default())?;
//! let objs = WaitGroup::new();
//! for unit in ["main", "lib"] {
//!     session.run_async(
//!         &objs,
//!         Invocation::new("cc")
//!             .args(["-c", "-o"])
//!             .arg(format!("{unit}.o"))
//!             .arg(format!("{unit}.c")),
//!         Deps::paths([format!("{unit}.c"), "lib.h".into()]),
//!     )?;
//! }
//! session.wait(&objs)?;
//! session.run(
//!     Invocation::new("cc").args(["main.o", "lib.o", "-o", "app"]),
//!     Deps::paths(["main.o", "lib.o"]),
//! )?;
//! session.close()?;
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod invocation;
pub mod ledger;
pub mod mtime;
mod pool;
mod queue;
mod runner;
mod session;
pub mod wait_group;

pub use config::Config;
pub use error::{Error, Result};
pub use exec::{ExecMode, Executor, ProcessExecutor};
pub use invocation::{Deps, Invocation};
pub use ledger::{EntryState, Ledger, LedgerRecord};
pub use runner::Outcome;
pub use session::Session;
pub use wait_group::WaitGroup;
