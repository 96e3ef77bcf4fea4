//! The two phases of a verification run.
//!
//! [run_catalog] probes every dataset of a catalog in parallel and streams rows into the raw
//! report; [summarize_report] turns that report into the sorted, failed, summary and flags
//! artifacts and prunes expired ones.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::catalog::fixture::FixtureError;
use crate::catalog::{Catalog, CatalogError, FixtureStore};
use crate::config::{ConfigError, RunConfig};
use crate::housekeeping::sweep_expired;
use crate::parallel::Progress;
use crate::probe::traceback::TRACEBACK_DIR;
use crate::probe::{ProbeSequence, TracebackLog};
use crate::report::{
    failed_rows, read_rows, sort_by_id, spawn_report_writer, verification_flags, write_flags,
    write_rows, ReportError,
};
use crate::sampler::{stable_seed, Rng};
use crate::summary::{summarize, write_summary};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error("unable to list datasets: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("housekeeping failed in '{path}': {source}")]
    Housekeeping { path: PathBuf, source: io::Error },
}

/// Load the catalog named by the configuration from its YAML file.
pub fn open_catalog(config: &RunConfig) -> Result<Catalog, RunError> {
    let store = FixtureStore::load(config.catalog_file_path(), &config.catalog)?;
    Ok(Catalog::from_fixture(store))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub datasets: usize,
    pub written: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub report: PathBuf,
    pub elapsed: Duration,
}

/// Probe every dataset of `catalog` and write the raw report for `today`.
///
/// Per-dataset failures end up in the report; only listing the catalog or writing the report
/// can fail the run.
pub fn run_catalog(
    config: &RunConfig,
    catalog: &Catalog,
    today: NaiveDate,
) -> Result<RunStats, RunError> {
    let started = Instant::now();
    let layout = config.layout(today);
    let data_ids = catalog.remote.data_ids()?;

    let policy = config.policy();
    let settings = config.probe_settings();
    let tracebacks = TracebackLog::new(layout.dir(), today, config.traceback_base_url.clone());
    let sequence = ProbeSequence::new(catalog, &policy, &tracebacks, &settings);
    let pool = config.worker_pool();
    let base_seed = config.base_seed();

    info!(
        catalog = %config.catalog,
        datasets = data_ids.len(),
        workers = pool.effective_workers(),
        seed = base_seed,
        "probe run started"
    );

    let sink = spawn_report_writer(&layout.raw_report())?;
    let sender = sink.sender();
    let progress = Progress::new("datasets", data_ids.len());
    let unsupported = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        data_ids.par_iter().for_each_with(sender, |tx, data_id| {
            let mut rng = Rng::new(stable_seed(base_seed, data_id));
            let row = sequence.run(data_id, &mut rng);
            if !row.supported {
                unsupported.fetch_add(1, Ordering::Relaxed);
            } else if row.is_failed() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
            if tx.send(row).is_err() {
                warn!(data_id = %data_id, "report writer stopped, row dropped");
            }
            progress.tick();
        });
    });

    let written = sink.finish()?;
    let stats = RunStats {
        datasets: data_ids.len(),
        written,
        unsupported: unsupported.into_inner(),
        failed: failed.into_inner(),
        report: layout.raw_report(),
        elapsed: started.elapsed(),
    };
    info!(
        datasets = stats.datasets,
        written = stats.written,
        unsupported = stats.unsupported,
        failed = stats.failed,
        elapsed = ?stats.elapsed,
        report = %stats.report.display(),
        "probe run finished"
    );
    Ok(stats)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryStats {
    pub rows: usize,
    pub failed: usize,
    pub categories: usize,
    pub removed: usize,
    pub elapsed: Duration,
}

/// Post-process the raw report written on `today`.
pub fn summarize_report(config: &RunConfig, today: NaiveDate) -> Result<SummaryStats, RunError> {
    let started = Instant::now();
    let layout = config.layout(today);

    let mut rows = read_rows(&layout.raw_report())?;
    sort_by_id(&mut rows);
    write_rows(&layout.sorted_report(), &rows)?;

    let failed = failed_rows(&rows);
    write_rows(&layout.failed_report(), &failed)?;

    let summary = summarize(&rows);
    write_summary(&layout.summary_report(), &summary)?;
    write_flags(&layout.flags_file(), &verification_flags(&rows))?;

    let mut removed = 0;
    for dir in [layout.dir().to_path_buf(), layout.dir().join(TRACEBACK_DIR)] {
        removed += sweep_expired(&dir, today, config.retention_days)
            .map_err(|source| RunError::Housekeeping { path: dir.clone(), source })?;
    }

    let stats = SummaryStats {
        rows: rows.len(),
        failed: failed.len(),
        categories: summary.len().saturating_sub(1),
        removed,
        elapsed: started.elapsed(),
    };
    info!(
        rows = stats.rows,
        failed = stats.failed,
        categories = stats.categories,
        removed = stats.removed,
        elapsed = ?stats.elapsed,
        "summary finished"
    );
    Ok(stats)
}
