//! Retention sweep over day-stamped artifacts.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

pub const DEFAULT_RETENTION_DAYS: i64 = 14;

/// Date encoded in the first ten characters of an artifact name (`YYYY-MM-DD...`).
pub fn artifact_date(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Delete every entry of `dir` dated strictly before `today - retention_days`.
///
/// Names without a date prefix are left alone. A missing directory is not an error; a single
/// entry that cannot be removed is logged and skipped. Returns the number of entries removed.
pub fn sweep_expired(dir: &Path, today: NaiveDate, retention_days: i64) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let cutoff = today - Duration::days(retention_days);

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(date) = name.to_str().and_then(artifact_date) else {
            continue;
        };
        if date >= cutoff {
            continue;
        }
        let path = entry.path();
        let result = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "removed expired artifact");
                removed += 1;
            }
            Err(err) => warn!(path = %path.display(), %err, "unable to remove expired artifact"),
        }
    }
    Ok(removed)
}
