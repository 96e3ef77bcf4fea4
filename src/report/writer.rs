//! Single owner of the raw report file.
//!
//! Workers send finished rows over a channel; one thread appends and flushes each row, so rows
//! never interleave however many workers probe in parallel.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use super::{csv_writer, ReportError, ResultRow};

pub struct ReportSink {
    sender: Sender<ResultRow>,
    handle: JoinHandle<Result<usize, ReportError>>,
}

impl ReportSink {
    /// Handle for one producer. Rows are written in arrival order.
    pub fn sender(&self) -> Sender<ResultRow> {
        self.sender.clone()
    }

    /// Close the channel and wait for the writer; returns the number of rows written.
    pub fn finish(self) -> Result<usize, ReportError> {
        let Self { sender, handle } = self;
        drop(sender);
        handle.join().map_err(|_| ReportError::WriterPanicked)?
    }
}

/// Truncate `path`, write the header, and start the writer thread.
pub fn spawn_report_writer(path: &Path) -> Result<ReportSink, ReportError> {
    let mut writer = csv_writer(path)?;
    writer.flush().map_err(|e| ReportError::io(path, e))?;

    let report_path: PathBuf = path.to_path_buf();
    let (sender, receiver) = mpsc::channel::<ResultRow>();
    let handle = thread::Builder::new()
        .name("report-writer".to_string())
        .spawn(move || -> Result<usize, ReportError> {
            let path = report_path;
            let mut written = 0usize;
            for row in receiver {
                writer
                    .serialize(&row)
                    .map_err(|e| ReportError::csv(&path, e))?;
                writer.flush().map_err(|e| ReportError::io(&path, e))?;
                written += 1;
            }
            Ok(written)
        })
        .map_err(|e| ReportError::io(path, e))?;

    Ok(ReportSink { sender, handle })
}
