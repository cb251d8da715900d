//! Filesystem modification times in Unix seconds.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get a file's mtime as seconds since the Unix epoch.
///
/// Returns `None` when the file is missing or its metadata is unavailable.
pub fn file_mtime_secs(path: &Path) -> Option<u64> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    system_time_secs(mtime)
}

/// Current wall-clock time as seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    system_time_secs(SystemTime::now()).unwrap_or(0)
}

fn system_time_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Returns `true` if `output` is missing or older than `input`.
///
/// Intended for ad-hoc checks in build scripts that compare one produced
/// file against its source without going through the ledger.
///
/// # Errors
///
/// Fails if `input` cannot be stat'ed.
pub fn needs_rebuild(output: &Path, input: &Path) -> io::Result<bool> {
    let input_mtime = fs::metadata(input)?.modified()?;
    match fs::metadata(output) {
        Ok(meta) => Ok(meta.modified()? < input_mtime),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}
