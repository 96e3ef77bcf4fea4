//! Report artifacts: the per-dataset CSV, its sorted and failed variants, and the
//! verification-flags JSON, all under one day-stamped directory per catalog.

pub mod row;
pub mod writer;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use row::{ResultRow, HEADER};
pub use writer::{spawn_report_writer, ReportSink};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("CSV error in '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("JSON error in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("report writer thread panicked")]
    WriterPanicked,
}

impl ReportError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Paths of every artifact a run produces for one catalog and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    dir: PathBuf,
    catalog: String,
    date: NaiveDate,
}

impl ReportLayout {
    /// `<output>/<mode>/<catalog>/`, or `<output>/<catalog>/` without a mode.
    pub fn new(output: impl AsRef<Path>, mode: Option<&str>, catalog: &str, date: NaiveDate) -> Self {
        let mut dir = output.as_ref().to_path_buf();
        if let Some(mode) = mode.filter(|m| !m.is_empty()) {
            dir.push(mode);
        }
        dir.push(catalog);
        Self {
            dir,
            catalog: catalog.to_string(),
            date,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn stamp(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    fn report_file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_test_{}_data_support{suffix}.csv",
            self.stamp(),
            self.catalog
        ))
    }

    /// Rows in arrival order, written by the probe run.
    pub fn raw_report(&self) -> PathBuf {
        self.report_file("")
    }

    pub fn sorted_report(&self) -> PathBuf {
        self.report_file("_sorted")
    }

    pub fn failed_report(&self) -> PathBuf {
        self.report_file("_failed_sorted")
    }

    pub fn summary_report(&self) -> PathBuf {
        self.report_file("_summary_sorted")
    }

    pub fn flags_file(&self) -> PathBuf {
        self.dir
            .join(format!("{}_DrsID_verification_flags.json", self.stamp()))
    }
}

/// Read a per-dataset report. Flag cells must be exactly `yes`, `no` or `not_tested`.
pub fn read_rows(path: &Path) -> Result<Vec<ResultRow>, ReportError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ReportError::csv(path, e))?;
    reader
        .deserialize()
        .map(|record| record.map_err(|e| ReportError::csv(path, e)))
        .collect()
}

pub fn write_rows(path: &Path, rows: &[ResultRow]) -> Result<(), ReportError> {
    let mut writer = csv_writer(path)?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ReportError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ReportError::io(path, e))
}

/// Header-first CSV writer on a fresh (truncated) file.
pub(crate) fn csv_writer(path: &Path) -> Result<csv::Writer<File>, ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(HEADER)
        .map_err(|e| ReportError::csv(path, e))?;
    Ok(writer)
}

/// Stable sort by dataset id.
pub fn sort_by_id(rows: &mut [ResultRow]) {
    rows.sort_by(|a, b| a.data_id.cmp(&b.data_id));
}

/// Supported rows with at least one explicit `no`.
pub fn failed_rows(rows: &[ResultRow]) -> Vec<ResultRow> {
    rows.iter().filter(|row| row.is_failed()).cloned().collect()
}

/// Entry of the verification-flags file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFlags {
    pub data_type: String,
    pub verification_flags: Vec<String>,
    pub title: String,
}

pub fn verification_flags(rows: &[ResultRow]) -> BTreeMap<String, VerificationFlags> {
    rows.iter()
        .map(|row| {
            (
                row.data_id.clone(),
                VerificationFlags {
                    data_type: row.data_type.clone(),
                    verification_flags: row.capability_tags(),
                    title: row.title.clone(),
                },
            )
        })
        .collect()
}

pub fn write_flags(
    path: &Path,
    flags: &BTreeMap<String, VerificationFlags>,
) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, flags).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.write_all(b"\n")
        .and_then(|_| out.flush())
        .map_err(|e| ReportError::io(path, e))
}
