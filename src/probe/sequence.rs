//! The ordered probe sequence for one dataset.
//!
//! Type check, unconstrained open, temporal and spatial opens (independent of each other), a
//! joint gate, the combined open, then numeric, visualization and cache probes on the combined
//! subset. Every collaborator failure ends up as an outcome plus comment on the returned row;
//! nothing here propagates an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::comment::{label_segments, merge_probe_comments, OPEN_ONLY_NOTE};
use super::{
    run_with_deadline, OpenStage, ProbeFailure, ProbeKind, ProbeOutcome, ProbeResult,
    TracebackLog,
};
use crate::catalog::{
    preferred_type_specifier, BBox, Catalog, CatalogError, CatalogErrorKind, DataStore, Dataset,
    LocalStore, OpenRequest, TimeRange,
};
use crate::policy::SupportPolicy;
use crate::report::ResultRow;
use crate::sampler::{sample_region, sample_time_range, select_variables, Rng};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RETRY_EXTENSION_DAYS: i64 = 4;

pub const NO_TIME_NOTE: &str = "Dataset has no time dimension to constrain.";
pub const NO_BBOX_NOTE: &str = "Dataset declares no bounding box to constrain.";

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Wall-clock bound for every open and every probe.
    pub timeout: Duration,
    /// Days added to the end of an empty time window before a single retry; `None` disables it.
    pub retry_extension_days: Option<i64>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_extension_days: Some(DEFAULT_RETRY_EXTENSION_DAYS),
        }
    }
}

/// Shared, read-only dependencies of a probe run. Cheap to copy into each worker.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSequence<'a> {
    catalog: &'a Catalog,
    policy: &'a SupportPolicy,
    tracebacks: &'a TracebackLog,
    settings: &'a ProbeSettings,
}

impl<'a> ProbeSequence<'a> {
    pub fn new(
        catalog: &'a Catalog,
        policy: &'a SupportPolicy,
        tracebacks: &'a TracebackLog,
        settings: &'a ProbeSettings,
    ) -> Self {
        Self {
            catalog,
            policy,
            tracebacks,
            settings,
        }
    }

    /// Probe one dataset and return its report row.
    pub fn run(&self, data_id: &str, rng: &mut Rng) -> ResultRow {
        let mut row = ResultRow::new(data_id);

        let decision = self.policy.classify(data_id);
        if !decision.supported {
            row.supported = false;
            let reason = decision.reason.unwrap_or_default();
            self.abort(&mut row, ProbeFailure::Unsupported(reason));
            info!(data_id, "not supported, probes skipped");
            return row;
        }

        self.probe(&mut row, rng);
        info!(
            data_id,
            open = %row.open,
            open_temp = %row.open_temporal,
            open_bbox = %row.open_spatial,
            cache = %row.cache,
            map = %row.visualize,
            "dataset probed"
        );
        row
    }

    fn abort(&self, row: &mut ResultRow, failure: ProbeFailure) {
        debug!(data_id = %row.data_id, %failure, "probe sequence stopped");
        row.fail_remaining();
        row.comment = failure.to_string();
    }

    fn probe(&self, row: &mut ResultRow, rng: &mut Rng) {
        let data_id = row.data_id.clone();

        let id = data_id.clone();
        let offered = match self.lookup(&data_id, move |store| store.type_specifiers(&id)) {
            Ok(offered) => offered,
            Err(failure) => return self.abort(row, failure),
        };
        let Some(type_specifier) = preferred_type_specifier(&offered).map(str::to_string) else {
            return self.abort(row, ProbeFailure::WrongType { data_id, offered });
        };

        let (id, specifier) = (data_id.clone(), type_specifier.clone());
        let descriptor = match self.lookup(&data_id, move |store| store.describe(&id, &specifier)) {
            Ok(descriptor) => descriptor,
            Err(failure) => return self.abort(row, failure),
        };
        row.data_type = descriptor.data_type.clone();
        row.title = descriptor.title.clone().unwrap_or_default();

        let variables = select_variables(&descriptor, rng);
        let region = sample_region(&descriptor, rng);
        debug!(data_id = %data_id, ?variables, ?region, "sampled probe parameters");
        let base = OpenRequest::new(data_id.as_str()).with_variables(&variables);

        let time_range = match self.open_unconstrained(&base) {
            Ok(opened) => {
                let range = sample_time_range(&descriptor, Some(opened.as_ref()));
                opened.close();
                range
            }
            Err(failure) => return self.abort(row, failure),
        };
        row.set(ProbeKind::Open, ProbeOutcome::Yes);

        let (temporal, time_range) = self.probe_temporal(&base, time_range);
        let spatial = self.probe_spatial(&base, region);
        row.set(ProbeKind::OpenTemporal, temporal.outcome);
        row.set(ProbeKind::OpenSpatial, spatial.outcome);

        if !(temporal.is_passed() && spatial.is_passed()) {
            row.set(ProbeKind::Cache, ProbeOutcome::No);
            row.set(ProbeKind::Visualize, ProbeOutcome::No);
            row.comment = label_segments(&[
                Some(OPEN_ONLY_NOTE),
                temporal.comment.as_deref(),
                spatial.comment.as_deref(),
            ]);
            return;
        }

        let combined = base.with_time_range(time_range).with_region(region);
        let (dataset, combined) = match self.open_with_retry(OpenStage::Combined, combined) {
            Ok(opened) => opened,
            Err(failure) => {
                row.set(ProbeKind::Cache, ProbeOutcome::No);
                row.set(ProbeKind::Visualize, ProbeOutcome::No);
                row.comment = failure.to_string();
                return;
            }
        };

        let numeric = self.probe_numeric(Arc::clone(&dataset));
        if !numeric.is_passed() {
            row.set(ProbeKind::OpenSpatial, numeric.outcome);
        }
        let visualization = self.probe_visualization(Arc::clone(&dataset), &variables);
        row.set(ProbeKind::Visualize, visualization.outcome);
        dataset.close();

        let cache = self.probe_cache(&combined);
        row.set(ProbeKind::Cache, cache.outcome);

        row.comment = merge_probe_comments(
            numeric.comment.as_deref(),
            visualization.comment.as_deref(),
            cache.comment.as_deref(),
        );
    }

    /// Run `f` under the probe deadline. Expiry and worker loss become failures.
    fn guarded<T, F>(&self, name: &str, f: F) -> Result<T, ProbeFailure>
    where
        F: FnOnce() -> Result<T, ProbeFailure> + Send + 'static,
        T: Send + 'static,
    {
        run_with_deadline(name, self.settings.timeout, f)?
    }

    /// Catalog metadata call under the deadline; errors become describe failures.
    fn lookup<T, F>(&self, data_id: &str, f: F) -> Result<T, ProbeFailure>
    where
        F: FnOnce(&dyn DataStore) -> Result<T, CatalogError> + Send + 'static,
        T: Send + 'static,
    {
        let remote = Arc::clone(&self.catalog.remote);
        self.guarded("describe", move || Ok(f(remote.as_ref())))?
            .map_err(|source| ProbeFailure::Describe {
                data_id: data_id.to_string(),
                source,
            })
    }

    fn try_open(
        &self,
        stage: OpenStage,
        request: &OpenRequest,
    ) -> Result<Result<Arc<dyn Dataset>, CatalogError>, ProbeFailure> {
        let remote = Arc::clone(&self.catalog.remote);
        let owned = request.clone();
        self.guarded(stage.as_str(), move || Ok(remote.open(&owned)))
    }

    fn open_failure(
        &self,
        stage: OpenStage,
        request: &OpenRequest,
        source: CatalogError,
    ) -> ProbeFailure {
        warn!(data_id = %request.data_id, %stage, error = %source, "open failed");
        let reference = self.tracebacks.record(request, &source);
        ProbeFailure::Open {
            stage,
            reference,
            source,
        }
    }

    fn open_checked(
        &self,
        stage: OpenStage,
        request: &OpenRequest,
    ) -> Result<Arc<dyn Dataset>, ProbeFailure> {
        self.try_open(stage, request)?
            .map_err(|source| self.open_failure(stage, request, source))
    }

    /// Open, retrying once with a longer window when the time range selects nothing.
    /// Returns the request that actually succeeded.
    fn open_with_retry(
        &self,
        stage: OpenStage,
        request: OpenRequest,
    ) -> Result<(Arc<dyn Dataset>, OpenRequest), ProbeFailure> {
        let err = match self.try_open(stage, &request)? {
            Ok(opened) => return Ok((opened, request)),
            Err(err) => err,
        };
        let (days, retry) = match (
            err.kind,
            request.time_range,
            self.settings.retry_extension_days,
        ) {
            (CatalogErrorKind::EmptyTimeRange, Some(range), Some(days)) => (
                days,
                request
                    .clone()
                    .with_time_range(Some(range.extended_by_days(days))),
            ),
            _ => return Err(self.open_failure(stage, &request, err)),
        };

        info!(data_id = %request.data_id, %stage, days, "empty time range, retrying with a later end");
        match self.try_open(stage, &retry)? {
            Ok(opened) => Ok((opened, retry)),
            Err(err) => Err(self.open_failure(stage, &retry, err)),
        }
    }

    fn open_unconstrained(&self, request: &OpenRequest) -> Result<Arc<dyn Dataset>, ProbeFailure> {
        let opened = self.open_checked(OpenStage::Unconstrained, request)?;
        if !request.variables.is_empty() {
            let present = opened.data_vars();
            if !request.variables.iter().any(|v| present.contains(v)) {
                opened.close();
                return Err(ProbeFailure::MissingVariables {
                    requested: request.variables.clone(),
                });
            }
        }
        Ok(opened)
    }

    /// Returns the window that actually opened, which may have been extended.
    fn probe_temporal(
        &self,
        base: &OpenRequest,
        range: Option<TimeRange>,
    ) -> (ProbeResult, Option<TimeRange>) {
        let Some(range) = range else {
            return (ProbeResult::not_tested(NO_TIME_NOTE), None);
        };
        let request = base.clone().with_time_range(Some(range));
        match self.open_with_retry(OpenStage::Temporal, request) {
            Ok((opened, effective)) => {
                opened.close();
                (ProbeResult::passed(), effective.time_range)
            }
            Err(failure) => (ProbeResult::failed(&failure), Some(range)),
        }
    }

    fn probe_spatial(&self, base: &OpenRequest, region: Option<BBox>) -> ProbeResult {
        let Some(region) = region else {
            return ProbeResult::not_tested(NO_BBOX_NOTE);
        };
        let request = base.clone().with_region(Some(region));
        match self.open_checked(OpenStage::Spatial, &request) {
            Ok(opened) => {
                opened.close();
                ProbeResult::passed()
            }
            Err(failure) => ProbeResult::failed(&failure),
        }
    }

    fn probe_numeric(&self, dataset: Arc<dyn Dataset>) -> ProbeResult {
        ProbeResult::from_attempt(
            self.guarded("numeric", move || reduce_first_variable(dataset.as_ref())),
        )
    }

    fn probe_visualization(&self, dataset: Arc<dyn Dataset>, requested: &[String]) -> ProbeResult {
        let requested = requested.to_vec();
        self.guarded("visualization", move || {
            Ok(check_map_ready(dataset.as_ref(), &requested))
        })
        .unwrap_or_else(|failure| ProbeResult::failed(&failure))
    }

    /// Write, reopen and close a local copy. The copy is deleted whatever happened.
    ///
    /// The worker deletes its own copy once the write returns, so a copy written after the
    /// deadline expired is still removed.
    fn probe_cache(&self, request: &OpenRequest) -> ProbeResult {
        let local_id = format!("local.{}", Uuid::new_v4().simple());
        let local = Arc::clone(&self.catalog.local);
        let id = local_id.clone();
        let owned = request.clone();
        let attempt = self.guarded("cache", move || {
            let written = write_and_reopen(local.as_ref(), &id, &owned);
            discard_local(local.as_ref(), &id);
            written
        });

        if attempt.is_err() {
            discard_local(self.catalog.local.as_ref(), &local_id);
        }
        ProbeResult::from_attempt(attempt)
    }
}

fn write_and_reopen(
    local: &dyn LocalStore,
    local_id: &str,
    request: &OpenRequest,
) -> Result<(), ProbeFailure> {
    local
        .write_local(local_id, request)
        .map_err(|source| cache_failure(local_id, source))?;
    let copy = local
        .open_local(local_id)
        .map_err(|source| cache_failure(local_id, source))?;
    copy.close();
    Ok(())
}

fn discard_local(local: &dyn LocalStore, local_id: &str) {
    if let Err(err) = local.delete_local(local_id) {
        debug!(%local_id, %err, "no local copy to delete");
    }
}

fn cache_failure(local_id: &str, source: CatalogError) -> ProbeFailure {
    match source.kind {
        CatalogErrorKind::DataAccess => ProbeFailure::CacheAccess {
            local_id: local_id.to_string(),
            source,
        },
        _ => ProbeFailure::Cache(source.message),
    }
}

/// Sum the first data variable and read the time axis bounds.
pub fn reduce_first_variable(dataset: &dyn Dataset) -> Result<(), ProbeFailure> {
    let variables = dataset.data_vars();
    let first = variables.first().ok_or_else(|| {
        ProbeFailure::Processing(format!(
            "Failed at getting first variable from list {variables:?}."
        ))
    })?;
    dataset.sum(first).map_err(|err| {
        ProbeFailure::Processing(format!("Failed executing sum over {first} with: {err}"))
    })?;

    let stamps = dataset.timestamps().map_err(|err| {
        ProbeFailure::Processing(format!("Failed reading time coordinate with: {err}"))
    })?;
    if let (Some(first_stamp), Some(last_stamp)) = (stamps.first(), stamps.last()) {
        if first_stamp > last_stamp {
            return Err(ProbeFailure::Processing(format!(
                "Time coordinate is not ascending: {first_stamp} .. {last_stamp}."
            )));
        }
        debug!(%first_stamp, %last_stamp, "time axis readable");
    }
    Ok(())
}

/// At least one variable must end in `(lat, lon)` with 1-D, non-empty coordinates.
///
/// Every variable is checked; the last violation is kept as the comment even on success.
pub fn check_map_ready(dataset: &dyn Dataset, requested: &[String]) -> ProbeResult {
    let variables = dataset.data_vars();
    if variables.is_empty() {
        return ProbeResult::failed(&ProbeFailure::Visualization(format!(
            "Dataset has none of the requested variables: {requested:?}."
        )));
    }

    let mut ready = 0usize;
    let mut violation = None;
    for var in &variables {
        let dims = dataset.dims(var).unwrap_or_default();
        let tail = &dims[dims.len().saturating_sub(2)..];
        if tail != &["lat", "lon"] {
            violation = Some(format!("Last two dimensions of variable {var}: {tail:?}."));
            continue;
        }
        let lat = dataset.coord_shape("lat").unwrap_or_default();
        let lon = dataset.coord_shape("lon").unwrap_or_default();
        match (lat.as_slice(), lon.as_slice()) {
            ([lat_len], [lon_len]) if *lat_len > 0 && *lon_len > 0 => ready += 1,
            ([lat_len], [lon_len]) => {
                violation = Some(format!(
                    "Variable {var} has an empty spatial axis, lat size: {lat_len}, lon size: {lon_len}."
                ))
            }
            _ => {
                violation = Some(format!(
                    "Coordinates of variable {var} are not one-dimensional, lat shape: {lat:?}, lon shape: {lon:?}."
                ))
            }
        }
    }

    if ready > 0 {
        ProbeResult::passed_with(violation)
    } else {
        let message = violation.unwrap_or_else(|| {
            format!("None of variables: {variables:?} has lat and lon in correct order.")
        });
        ProbeResult::failed(&ProbeFailure::Visualization(message))
    }
}
