//! Dependency ledger for skipping up-to-date commands.
//!
//! Maps each command's invocation string to the time it last succeeded and
//! whether a build of it is currently in flight. A command is stale when any
//! of its dependency files is missing or was modified strictly after that
//! time. Concurrent attempts to build the same key are serialized: the first
//! caller claims the entry, later callers block until it is released and then
//! re-check staleness against the fresh result.
//!
//! The store on disk is a flat text file with one `<key> <unix-seconds>` line
//! per entry. Keys may contain spaces, so lines are split at the last space.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::mtime::{file_mtime_secs, now_secs};

/// Build state of a single ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// A build for this key is in flight.
    Running,
    /// No build for this key is in flight.
    Complete,
}

/// Snapshot of one ledger entry, as returned by [`Ledger::records`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRecord {
    /// The invocation string.
    pub key: String,
    /// Unix seconds of the last successful run, if any.
    pub last_success: Option<u64>,
    /// Current build state.
    pub state: EntryState,
}

struct Entry {
    key: String,
    last_success: Option<u64>,
    state: EntryState,
}

/// Insertion-ordered entries with a key index.
#[derive(Default)]
struct Entries {
    list: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Entries {
    fn insert(&mut self, key: &str, last_success: Option<u64>, state: EntryState) -> usize {
        if let Some(&idx) = self.index.get(key) {
            let entry = &mut self.list[idx];
            entry.last_success = last_success;
            entry.state = state;
            return idx;
        }
        let idx = self.list.len();
        self.list.push(Entry {
            key: key.to_string(),
            last_success,
            state,
        });
        self.index.insert(key.to_string(), idx);
        idx
    }

    fn is_running(&self, key: &str) -> bool {
        self.index
            .get(key)
            .is_some_and(|&idx| self.list[idx].state == EntryState::Running)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        let idx = *self.index.get(key)?;
        Some(&mut self.list[idx])
    }
}

/// Thread-safe per-command rebuild ledger.
pub struct Ledger {
    entries: Mutex<Entries>,
    released: Condvar,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            released: Condvar::new(),
        }
    }

    /// Load the ledger from its store.
    ///
    /// A missing store is a first run and yields an empty ledger.
    ///
    /// # Errors
    ///
    /// Fails if the store exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("ledger {} not found, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(Error::LedgerRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let ledger = Self::parse(&text)?;
        tracing::debug!("ledger {}: {} entries", path.display(), ledger.len());
        Ok(ledger)
    }

    /// Parse the text form of the store.
    ///
    /// Every non-blank line must end in a space followed by a decimal Unix
    /// timestamp. A repeated key replaces the earlier value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLedger`] for the first line that does not
    /// match.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Entries::default();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || Error::MalformedLedger {
                line: i + 1,
                content: line.to_string(),
            };
            let (key, stamp) = line.rsplit_once(' ').ok_or_else(malformed)?;
            if key.is_empty() {
                return Err(malformed());
            }
            let stamp: u64 = stamp.trim_end().parse().map_err(|_| malformed())?;
            entries.insert(key, Some(stamp), EntryState::Complete);
        }
        Ok(Self {
            entries: Mutex::new(entries),
            released: Condvar::new(),
        })
    }

    /// Render the store text: one line per entry that has succeeded at least
    /// once, in insertion order.
    ///
    /// Keys containing a line break cannot be represented in the store and
    /// are left out, so those commands run again in the next session.
    pub fn render(&self) -> String {
        let entries = self.entries.lock();
        let mut out = String::new();
        for entry in &entries.list {
            let Some(stamp) = entry.last_success else {
                continue;
            };
            if entry.key.contains(['\n', '\r']) {
                tracing::warn!("not persisting {:?}: key spans multiple lines", entry.key);
                continue;
            }
            out.push_str(&format!("{} {stamp}\n", entry.key));
        }
        out
    }

    /// Rewrite the store wholesale.
    ///
    /// Writes to a temporary sibling first and renames it over `path`.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::LedgerWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path: PathBuf = path.with_file_name(tmp_name);

        fs::write(&tmp_path, self.render()).map_err(write_err)?;
        fs::rename(&tmp_path, path).map_err(write_err)?;
        tracing::debug!("ledger saved to {} ({} entries)", path.display(), self.len());
        Ok(())
    }

    /// Number of entries, including ones that never succeeded.
    pub fn len(&self) -> usize {
        self.entries.lock().list.len()
    }

    /// Returns `true` if the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every entry in insertion order.
    pub fn records(&self) -> Vec<LedgerRecord> {
        self.entries
            .lock()
            .list
            .iter()
            .map(|e| LedgerRecord {
                key: e.key.clone(),
                last_success: e.last_success,
                state: e.state,
            })
            .collect()
    }

    /// Decide whether the command `key` must run because of `dependency`.
    ///
    /// A first sighting claims the key and returns `true` without looking at
    /// the dependency. If another thread holds the key, blocks until it is
    /// released and then checks staleness. When `true` is returned the caller
    /// holds the key and must release it with [`record_success`] or
    /// [`record_failure`].
    ///
    /// [`record_success`]: Ledger::record_success
    /// [`record_failure`]: Ledger::record_failure
    pub fn should_run(&self, key: &str, dependency: &Path) -> bool {
        debug_assert!(!key.is_empty(), "ledger keys must not be empty");
        let mut entries = self.entries.lock();

        if !entries.index.contains_key(key) {
            entries.insert(key, None, EntryState::Running);
            tracing::debug!("  stale: {key} (never built)");
            return true;
        }

        while entries.is_running(key) {
            self.released.wait(&mut entries);
        }

        let Some(entry) = entries.get_mut(key) else {
            unreachable!("ledger entries are never removed");
        };
        let stale = match (file_mtime_secs(dependency), entry.last_success) {
            (None, _) => {
                tracing::debug!("  stale: {key} ({} missing)", dependency.display());
                true
            }
            (Some(_), None) => {
                tracing::debug!("  stale: {key} (no successful run recorded)");
                true
            }
            (Some(mtime), Some(success)) if mtime > success => {
                tracing::debug!("  stale: {key} ({} changed)", dependency.display());
                true
            }
            _ => false,
        };
        if stale {
            entry.state = EntryState::Running;
        }
        stale
    }

    /// Check `dependencies` in order, stopping at the first stale one.
    ///
    /// Same claiming contract as [`Ledger::should_run`].
    pub fn should_run_any<P: AsRef<Path>>(&self, key: &str, dependencies: &[P]) -> bool {
        dependencies
            .iter()
            .any(|dep| self.should_run(key, dep.as_ref()))
    }

    /// Mark `key` as built now and wake every waiter.
    pub fn record_success(&self, key: &str) {
        self.release(key, Some(now_secs()));
    }

    /// Release `key` without recording a success and wake every waiter.
    ///
    /// The previous success time is kept, so the key stays stale for the
    /// dependencies that triggered the attempt.
    pub fn record_failure(&self, key: &str) {
        self.release(key, None);
    }

    fn release(&self, key: &str, success: Option<u64>) {
        {
            let mut entries = self.entries.lock();
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.state = EntryState::Complete;
                    if success.is_some() {
                        entry.last_success = success;
                    }
                }
                None => {
                    entries.insert(key, success, EntryState::Complete);
                }
            }
        }
        self.released.notify_all();
    }
}
