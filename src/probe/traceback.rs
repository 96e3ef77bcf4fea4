//! Diagnostic side-files for failed opens.
//!
//! The report comment only carries a reference; the request and the full error text land in
//! `<root>/<date>/<data_id>.txt`, appended per failure.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::catalog::{CatalogError, OpenRequest};

/// Directory name under the results directory.
pub const TRACEBACK_DIR: &str = "error_traceback";

#[derive(Debug, Clone)]
pub struct TracebackLog {
    root: PathBuf,
    date: NaiveDate,
    base_url: Option<String>,
}

impl TracebackLog {
    pub fn new(results_dir: impl AsRef<Path>, date: NaiveDate, base_url: Option<String>) -> Self {
        Self {
            root: results_dir.as_ref().join(TRACEBACK_DIR),
            date,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn file_name(data_id: &str) -> String {
        let safe: String = data_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        format!("{safe}.txt")
    }

    /// Append the failure and return the reference the report comment should carry.
    ///
    /// If the side-file cannot be written the error text itself is returned.
    pub fn record(&self, request: &OpenRequest, err: &CatalogError) -> String {
        let day = self.date.format("%Y-%m-%d").to_string();
        let file_name = Self::file_name(&request.data_id);
        let dir = self.root.join(&day);
        let path = dir.join(&file_name);

        let written = fs::create_dir_all(&dir).and_then(|_| {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(
                file,
                "[{}] {}\n{}\n",
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
                request,
                err
            )
        });
        if let Err(io) = written {
            tracing::warn!(path = %path.display(), %io, "unable to write traceback file");
            return err.to_string();
        }

        match &self.base_url {
            Some(base) => format!("{base}/{day}/{file_name}"),
            None => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn record_appends_request_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = TracebackLog::new(dir.path(), today(), None);
        let request = OpenRequest::new("esacci.SST.x");
        let first = log.record(&request, &CatalogError::data_access("first"));
        let second = log.record(&request, &CatalogError::data_access("second"));
        assert_eq!(first, second);

        let contents = fs::read_to_string(&first).unwrap();
        assert!(contents.contains("open_dataset(dataset_id=esacci.SST.x"));
        assert!(contents.contains("DataAccessError: first"));
        assert!(contents.contains("DataAccessError: second"));
        assert!(first.ends_with("error_traceback/2024-03-05/esacci.SST.x.txt"));
    }

    #[test]
    fn base_url_replaces_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let log = TracebackLog::new(
            dir.path(),
            today(),
            Some("https://example.org/tracebacks/".to_string()),
        );
        let reference = log.record(
            &OpenRequest::new("esacci.SST.x"),
            &CatalogError::other("boom"),
        );
        assert_eq!(
            reference,
            "https://example.org/tracebacks/2024-03-05/esacci.SST.x.txt"
        );
    }
}
