//! YAML-backed catalog implementing [DataStore] and [LocalStore].
//!
//! Each fixture entry declares the metadata a real catalog would describe plus the shape of the
//! data an open returns. `faults` injects collaborator failures and delays per call so every
//! probe path can be driven without a network backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{
    BBox, CatalogError, CatalogErrorKind, DataStore, Dataset, DatasetDescriptor, LocalStore,
    OpenRequest, TimeRange, VariableDescriptor, TYPE_DATASET,
};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("unable to read catalog '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse catalog '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Root of a catalog YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCatalogFile {
    #[serde(default)]
    pub name: Option<String>,
    pub datasets: Vec<FixtureDataset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureErrorKind {
    Store,
    DataAccess,
    EmptyTimeRange,
    RegionOutOfBounds,
    #[default]
    Other,
}

impl From<FixtureErrorKind> for CatalogErrorKind {
    fn from(kind: FixtureErrorKind) -> Self {
        match kind {
            FixtureErrorKind::Store => CatalogErrorKind::Store,
            FixtureErrorKind::DataAccess => CatalogErrorKind::DataAccess,
            FixtureErrorKind::EmptyTimeRange => CatalogErrorKind::EmptyTimeRange,
            FixtureErrorKind::RegionOutOfBounds => CatalogErrorKind::RegionOutOfBounds,
            FixtureErrorKind::Other => CatalogErrorKind::Other,
        }
    }
}

/// A failure the fixture raises instead of answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureFault {
    #[serde(default)]
    pub kind: FixtureErrorKind,
    pub message: String,
}

impl FixtureFault {
    pub fn new(kind: FixtureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn to_error(&self) -> CatalogError {
        CatalogError::new(self.kind.into(), self.message.clone())
    }
}

/// Injected failures and delays. Open faults are matched by the constraints of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureFaults {
    #[serde(default)]
    pub describe: Option<String>,
    /// Any remote open.
    #[serde(default)]
    pub open: Option<FixtureFault>,
    /// Opens constrained by time only.
    #[serde(default)]
    pub time_subset: Option<FixtureFault>,
    /// Opens constrained by region only.
    #[serde(default)]
    pub region_subset: Option<FixtureFault>,
    /// Opens constrained by time and region together.
    #[serde(default)]
    pub combined: Option<FixtureFault>,
    #[serde(default)]
    pub sum: Option<String>,
    #[serde(default)]
    pub write_local: Option<FixtureFault>,
    #[serde(default)]
    pub open_delay_ms: u64,
    #[serde(default)]
    pub sum_delay_ms: u64,
    #[serde(default)]
    pub write_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDataset {
    pub data_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_type_specifiers")]
    pub type_specifiers: Vec<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub spatial_res: Option<f64>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub time_period: Option<String>,
    /// Time coordinate of the full collection.
    #[serde(default)]
    pub timestamps: Vec<NaiveDateTime>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDescriptor>,
    #[serde(default)]
    pub coords: BTreeMap<String, Vec<usize>>,
    #[serde(default)]
    pub faults: FixtureFaults,
}

fn default_type_specifiers() -> Vec<String> {
    vec![TYPE_DATASET.to_string()]
}

impl FixtureDataset {
    /// A healthy global monthly grid for the year 2000 with two `(time, lat, lon)` variables.
    pub fn gridded(data_id: impl Into<String>) -> Self {
        let timestamps = (1..=12)
            .filter_map(|month| NaiveDate::from_ymd_opt(2000, month, 1))
            .filter_map(|day| day.and_hms_opt(0, 0, 0))
            .collect();
        let grid_dims = vec!["time".to_string(), "lat".to_string(), "lon".to_string()];
        let mut variables = BTreeMap::new();
        for name in ["analysed_sst", "sea_ice_fraction"] {
            variables.insert(
                name.to_string(),
                VariableDescriptor {
                    dims: grid_dims.clone(),
                },
            );
        }
        let mut coords = BTreeMap::new();
        coords.insert("lat".to_string(), vec![720]);
        coords.insert("lon".to_string(), vec![1440]);

        Self {
            data_id: data_id.into(),
            title: Some("Synthetic monthly grid".to_string()),
            type_specifiers: default_type_specifiers(),
            bbox: Some(BBox::new(-180.0, -90.0, 180.0, 90.0)),
            spatial_res: Some(0.25),
            time_range: NaiveDate::from_ymd_opt(2000, 1, 1)
                .zip(NaiveDate::from_ymd_opt(2000, 12, 31))
                .map(|(start, end)| TimeRange::new(start, end)),
            time_period: Some("1M".to_string()),
            timestamps,
            variables,
            coords,
            faults: FixtureFaults::default(),
        }
    }

    fn descriptor(&self, type_specifier: &str) -> DatasetDescriptor {
        DatasetDescriptor {
            data_id: self.data_id.clone(),
            title: self.title.clone(),
            data_type: type_specifier.to_string(),
            bbox: self.bbox,
            spatial_res: self.spatial_res,
            time_range: self.time_range,
            time_period: self.time_period.clone(),
            data_vars: self.variables.clone(),
        }
    }

    fn fault_for(&self, request: &OpenRequest) -> Option<&FixtureFault> {
        if let Some(fault) = &self.faults.open {
            return Some(fault);
        }
        match (request.time_range.is_some(), request.region.is_some()) {
            (true, true) => self.faults.combined.as_ref(),
            (true, false) => self.faults.time_subset.as_ref(),
            (false, true) => self.faults.region_subset.as_ref(),
            (false, false) => None,
        }
    }

    fn open(&self, request: &OpenRequest) -> Result<FixtureOpened, CatalogError> {
        sleep_ms(self.faults.open_delay_ms);
        if let Some(fault) = self.fault_for(request) {
            return Err(fault.to_error());
        }

        if let (Some(region), Some(bbox)) = (request.region, self.bbox) {
            if !bbox.intersects(&region) {
                return Err(CatalogError::new(
                    CatalogErrorKind::RegionOutOfBounds,
                    "Can not select a region outside dataset boundaries.",
                ));
            }
        }

        let timestamps: Vec<NaiveDateTime> = match request.time_range {
            Some(range) => self
                .timestamps
                .iter()
                .copied()
                .filter(|stamp| range.contains(*stamp))
                .collect(),
            None => self.timestamps.clone(),
        };
        if let Some(range) = request.time_range {
            if !self.timestamps.is_empty() && timestamps.is_empty() {
                return Err(CatalogError::new(
                    CatalogErrorKind::EmptyTimeRange,
                    format!(
                        "{} does not seem to have any datasets in given time range {range}",
                        self.data_id
                    ),
                ));
            }
        }

        let vars = self
            .variables
            .iter()
            .filter(|(name, _)| request.variables.is_empty() || request.variables.contains(name))
            .map(|(name, var)| (name.clone(), var.dims.clone()))
            .collect();

        Ok(FixtureOpened {
            vars,
            coords: self.coords.clone(),
            timestamps,
            sum_fault: self.faults.sum.clone(),
            sum_delay_ms: self.faults.sum_delay_ms,
        })
    }
}

fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

#[derive(Debug, Clone)]
struct FixtureOpened {
    vars: Vec<(String, Vec<String>)>,
    coords: BTreeMap<String, Vec<usize>>,
    timestamps: Vec<NaiveDateTime>,
    sum_fault: Option<String>,
    sum_delay_ms: u64,
}

impl Dataset for FixtureOpened {
    fn data_vars(&self) -> Vec<String> {
        self.vars.iter().map(|(name, _)| name.clone()).collect()
    }

    fn dims(&self, var: &str) -> Option<Vec<String>> {
        self.vars
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, dims)| dims.clone())
    }

    fn coord_shape(&self, name: &str) -> Option<Vec<usize>> {
        self.coords.get(name).cloned()
    }

    fn timestamps(&self) -> Result<Vec<NaiveDateTime>, CatalogError> {
        Ok(self.timestamps.clone())
    }

    fn sum(&self, var: &str) -> Result<f64, CatalogError> {
        sleep_ms(self.sum_delay_ms);
        if let Some(message) = &self.sum_fault {
            return Err(CatalogError::other(message.clone()));
        }
        if self.dims(var).is_none() {
            return Err(CatalogError::other(format!("no variable named '{var}'")));
        }
        Ok(self.timestamps.len() as f64)
    }
}

/// In-process catalog serving both the remote and the local-cache role.
#[derive(Debug)]
pub struct FixtureStore {
    name: String,
    order: Vec<String>,
    datasets: BTreeMap<String, FixtureDataset>,
    local: Mutex<BTreeMap<String, Arc<FixtureOpened>>>,
}

impl FixtureStore {
    pub fn new(name: impl Into<String>, datasets: Vec<FixtureDataset>) -> Self {
        let order = datasets.iter().map(|d| d.data_id.clone()).collect();
        let datasets = datasets
            .into_iter()
            .map(|d| (d.data_id.clone(), d))
            .collect();
        Self {
            name: name.into(),
            order,
            datasets,
            local: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load a catalog YAML file. The store name falls back to `default_name`.
    pub fn load(path: impl AsRef<Path>, default_name: &str) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FixtureCatalogFile =
            serde_yaml::from_str(&raw).map_err(|source| FixtureError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let name = file.name.unwrap_or_else(|| default_name.to_string());
        Ok(Self::new(name, file.datasets))
    }

    /// Ids of local copies currently held.
    pub fn local_ids(&self) -> Vec<String> {
        self.local_guard().keys().cloned().collect()
    }

    fn local_guard(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<FixtureOpened>>> {
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dataset(&self, data_id: &str) -> Result<&FixtureDataset, CatalogError> {
        self.datasets
            .get(data_id)
            .ok_or_else(|| CatalogError::store(format!("unknown data id '{data_id}'")))
    }
}

impl DataStore for FixtureStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_ids(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.order.clone())
    }

    fn type_specifiers(&self, data_id: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self.dataset(data_id)?.type_specifiers.clone())
    }

    fn describe(
        &self,
        data_id: &str,
        type_specifier: &str,
    ) -> Result<DatasetDescriptor, CatalogError> {
        let dataset = self.dataset(data_id)?;
        if let Some(message) = &dataset.faults.describe {
            return Err(CatalogError::store(message.clone()));
        }
        Ok(dataset.descriptor(type_specifier))
    }

    fn open(&self, request: &OpenRequest) -> Result<Arc<dyn Dataset>, CatalogError> {
        let opened: Arc<dyn Dataset> = Arc::new(self.dataset(&request.data_id)?.open(request)?);
        Ok(opened)
    }
}

impl LocalStore for FixtureStore {
    fn write_local(&self, local_id: &str, request: &OpenRequest) -> Result<(), CatalogError> {
        let dataset = self.dataset(&request.data_id)?;
        sleep_ms(dataset.faults.write_delay_ms);
        if let Some(fault) = &dataset.faults.write_local {
            return Err(fault.to_error());
        }
        let opened = dataset.open(request)?;
        self.local_guard()
            .insert(local_id.to_string(), Arc::new(opened));
        Ok(())
    }

    fn open_local(&self, local_id: &str) -> Result<Arc<dyn Dataset>, CatalogError> {
        let opened = self
            .local_guard()
            .get(local_id)
            .cloned()
            .ok_or_else(|| CatalogError::data_access(format!("no local data '{local_id}'")))?;
        let opened: Arc<dyn Dataset> = opened;
        Ok(opened)
    }

    fn delete_local(&self, local_id: &str) -> Result<(), CatalogError> {
        match self.local_guard().remove(local_id) {
            Some(_) => Ok(()),
            None => Err(CatalogError::store(format!(
                "no local data '{local_id}' to delete"
            ))),
        }
    }
}
