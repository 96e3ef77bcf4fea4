//! Contract with the external data-access library.
//!
//! The harness never talks to a concrete backend directly: it sees a remote [DataStore] that can
//! list, describe, and open datasets, a [LocalStore] that can persist a local copy, and the
//! opened [Dataset] handles both return. [fixture] implements the contract from a YAML catalog.

pub mod fixture;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use fixture::{FixtureDataset, FixtureStore};

/// Type specifier of a gridded cube; preferred over [TYPE_DATASET] when both are offered.
pub const TYPE_CUBE: &str = "dataset[cube]";
/// Type specifier of a plain gridded dataset.
pub const TYPE_DATASET: &str = "dataset";

/// Pick the first preferred gridded type out of what the catalog offers for a dataset.
pub fn preferred_type_specifier(offered: &[String]) -> Option<&str> {
    [TYPE_CUBE, TYPE_DATASET]
        .into_iter()
        .find_map(|preferred| offered.iter().find(|t| t.as_str() == preferred))
        .map(String::as_str)
}

/// ECV (category) name: second segment of a dot- or dash-delimited dataset id.
///
/// Ids with a single segment are their own category.
pub fn ecv_name(data_id: &str) -> &str {
    let separator = if data_id.contains('.') { '.' } else { '-' };
    data_id.split(separator).nth(1).unwrap_or(data_id)
}

/// Axis-aligned box in dataset coordinates: `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Inclusive date window used for temporal subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, stamp: NaiveDateTime) -> bool {
        let day = stamp.date();
        day >= self.start && day <= self.end
    }

    /// Same start, end pushed back by `days`. Saturates at the calendar limit.
    pub fn extended_by_days(&self, days: i64) -> Self {
        let end = self
            .end
            .checked_add_signed(chrono::Duration::days(days))
            .unwrap_or(self.end);
        Self::new(self.start, end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "('{}', '{}')",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Per-variable metadata declared by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    #[serde(default)]
    pub dims: Vec<String>,
}

/// Read-only metadata of one dataset collection, as described by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub data_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub spatial_res: Option<f64>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    /// Nominal time step such as `1D`, `8D`, `1M`, `1Y`.
    #[serde(default)]
    pub time_period: Option<String>,
    #[serde(default)]
    pub data_vars: BTreeMap<String, VariableDescriptor>,
}

fn default_data_type() -> String {
    TYPE_DATASET.to_string()
}

/// Constraints applied when opening a dataset. Empty `variables` means all variables.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub data_id: String,
    pub variables: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub region: Option<BBox>,
}

impl OpenRequest {
    pub fn new(data_id: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            variables: Vec::new(),
            time_range: None,
            region: None,
        }
    }

    pub fn with_variables(mut self, variables: &[String]) -> Self {
        self.variables = variables.to_vec();
        self
    }

    pub fn with_time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn with_region(mut self, region: Option<BBox>) -> Self {
        self.region = region;
        self
    }
}

impl fmt::Display for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time_range = self
            .time_range
            .map(|t| t.to_string())
            .unwrap_or_else(|| "None".to_string());
        let region = self
            .region
            .map(|r| r.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "open_dataset(dataset_id={}, time_range={}, var_names={:?}, region={})",
            self.data_id, time_range, self.variables, region
        )
    }
}

/// Stable error codes reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Metadata lookup (describe, type specifiers, listing) failed.
    Store,
    /// Library-specific data access failure.
    DataAccess,
    /// The requested time range selects no files.
    EmptyTimeRange,
    /// The requested region lies outside the dataset boundaries.
    RegionOutOfBounds,
    Other,
}

impl CatalogErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "DataStoreError",
            Self::DataAccess => "DataAccessError",
            Self::EmptyTimeRange => "EmptyTimeRangeError",
            Self::RegionOutOfBounds => "RegionOutOfBoundsError",
            Self::Other => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", .kind.as_str())]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Store, message)
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::DataAccess, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Other, message)
    }
}

/// An opened (possibly lazily streamed) dataset.
pub trait Dataset: Send + Sync {
    /// Names of the data variables present, in dataset order.
    fn data_vars(&self) -> Vec<String>;

    /// Dimension names of a data variable, outermost first.
    fn dims(&self, var: &str) -> Option<Vec<String>>;

    /// Shape of a coordinate variable such as `lat` or `lon`.
    fn coord_shape(&self, name: &str) -> Option<Vec<usize>>;

    /// Time coordinate values, ascending. Empty when there is no time dimension.
    fn timestamps(&self) -> Result<Vec<NaiveDateTime>, CatalogError>;

    /// Reduce a variable to the sum of its values, forcing the data to be read.
    fn sum(&self, var: &str) -> Result<f64, CatalogError>;

    fn close(&self) {}
}

/// Remote catalog: discovery, description, and (subsetting) open.
pub trait DataStore: Send + Sync {
    fn name(&self) -> &str;

    fn data_ids(&self) -> Result<Vec<String>, CatalogError>;

    fn type_specifiers(&self, data_id: &str) -> Result<Vec<String>, CatalogError>;

    fn describe(&self, data_id: &str, type_specifier: &str)
        -> Result<DatasetDescriptor, CatalogError>;

    fn open(&self, request: &OpenRequest) -> Result<Arc<dyn Dataset>, CatalogError>;
}

/// Local cache store: persist a subset under a local id, reopen it, and delete it.
pub trait LocalStore: Send + Sync {
    fn write_local(&self, local_id: &str, request: &OpenRequest) -> Result<(), CatalogError>;

    fn open_local(&self, local_id: &str) -> Result<Arc<dyn Dataset>, CatalogError>;

    fn delete_local(&self, local_id: &str) -> Result<(), CatalogError>;
}

/// Collaborator handles for one run, shared by every worker.
#[derive(Clone)]
pub struct Catalog {
    pub remote: Arc<dyn DataStore>,
    pub local: Arc<dyn LocalStore>,
}

impl Catalog {
    pub fn new(remote: Arc<dyn DataStore>, local: Arc<dyn LocalStore>) -> Self {
        Self { remote, local }
    }

    /// Both roles served by one fixture store.
    pub fn from_fixture(store: FixtureStore) -> Self {
        let store = Arc::new(store);
        Self {
            remote: store.clone(),
            local: store,
        }
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("remote", &self.remote.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecv_name_uses_second_segment() {
        assert_eq!(
            ecv_name("esacci.OC.day.L3S.CHLOR_A.multi-sensor.multi-platform.MERGED.5-0.geographic"),
            "OC"
        );
        assert_eq!(ecv_name("esacci-SST-v2"), "SST");
        assert_eq!(ecv_name("standalone"), "standalone");
    }

    #[test]
    fn cube_specifier_is_preferred() {
        let offered = vec![TYPE_DATASET.to_string(), TYPE_CUBE.to_string()];
        assert_eq!(preferred_type_specifier(&offered), Some(TYPE_CUBE));

        let vector_only = vec!["geodataframe".to_string()];
        assert_eq!(preferred_type_specifier(&vector_only), None);
    }

    #[test]
    fn time_range_extension_keeps_start() {
        let start = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2001, 1, 10).unwrap();
        let extended = TimeRange::new(start, end).extended_by_days(4);
        assert_eq!(extended.start, start);
        assert_eq!(extended.end, NaiveDate::from_ymd_opt(2001, 1, 14).unwrap());
    }

    #[test]
    fn catalog_error_display_carries_kind() {
        let err = CatalogError::data_access("no such file");
        assert_eq!(err.to_string(), "DataAccessError: no such file");
    }
}
