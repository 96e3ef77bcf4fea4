//! One report row per dataset.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::catalog::{ecv_name, TYPE_DATASET};
use crate::probe::{ProbeKind, ProbeOutcome};

/// Column order of the per-dataset report.
pub const HEADER: [&str; 11] = [
    "ECV-Name",
    "Dataset-ID",
    "Dataset-Title",
    "supported",
    "Data-Type",
    "open(1)",
    "open_temp(2)",
    "open_bbox(3)",
    "cache(4)",
    "map(5)",
    "comment",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "ECV-Name")]
    pub ecv: String,
    #[serde(rename = "Dataset-ID")]
    pub data_id: String,
    #[serde(rename = "Dataset-Title")]
    pub title: String,
    #[serde(rename = "supported", with = "yes_no")]
    pub supported: bool,
    #[serde(rename = "Data-Type")]
    pub data_type: String,
    #[serde(rename = "open(1)")]
    pub open: ProbeOutcome,
    #[serde(rename = "open_temp(2)")]
    pub open_temporal: ProbeOutcome,
    #[serde(rename = "open_bbox(3)")]
    pub open_spatial: ProbeOutcome,
    #[serde(rename = "cache(4)")]
    pub cache: ProbeOutcome,
    #[serde(rename = "map(5)")]
    pub visualize: ProbeOutcome,
    pub comment: String,
}

impl ResultRow {
    /// Supported, nothing probed yet.
    pub fn new(data_id: &str) -> Self {
        Self {
            ecv: ecv_name(data_id).to_string(),
            data_id: data_id.to_string(),
            title: String::new(),
            supported: true,
            data_type: TYPE_DATASET.to_string(),
            open: ProbeOutcome::NotTested,
            open_temporal: ProbeOutcome::NotTested,
            open_spatial: ProbeOutcome::NotTested,
            cache: ProbeOutcome::NotTested,
            visualize: ProbeOutcome::NotTested,
            comment: String::new(),
        }
    }

    pub fn outcome(&self, kind: ProbeKind) -> ProbeOutcome {
        match kind {
            ProbeKind::Open => self.open,
            ProbeKind::OpenTemporal => self.open_temporal,
            ProbeKind::OpenSpatial => self.open_spatial,
            ProbeKind::Cache => self.cache,
            ProbeKind::Visualize => self.visualize,
        }
    }

    pub fn set(&mut self, kind: ProbeKind, outcome: ProbeOutcome) {
        let slot = match kind {
            ProbeKind::Open => &mut self.open,
            ProbeKind::OpenTemporal => &mut self.open_temporal,
            ProbeKind::OpenSpatial => &mut self.open_spatial,
            ProbeKind::Cache => &mut self.cache,
            ProbeKind::Visualize => &mut self.visualize,
        };
        *slot = outcome;
    }

    /// Mark every probe that has not run yet as failed.
    pub fn fail_remaining(&mut self) {
        for kind in ProbeKind::ALL {
            if self.outcome(kind) == ProbeOutcome::NotTested {
                self.set(kind, ProbeOutcome::No);
            }
        }
    }

    /// Supported, yet at least one probe explicitly answered `no`.
    pub fn is_failed(&self) -> bool {
        self.supported
            && ProbeKind::ALL
                .iter()
                .any(|kind| self.outcome(*kind) == ProbeOutcome::No)
    }

    /// Tags of passed probes, in column order.
    pub fn capability_tags(&self) -> Vec<String> {
        ProbeKind::ALL
            .iter()
            .filter(|kind| self.outcome(**kind).is_yes())
            .filter_map(|kind| kind.capability_tag())
            .map(str::to_string)
            .collect()
    }
}

/// `supported` column: `yes` or `no`, nothing else.
mod yes_no {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'yes' or 'no', found '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_row_derives_ecv_from_id() {
        let row = ResultRow::new("esacci.SST.day.L4.SSTdepth");
        assert_eq!(row.ecv, "SST");
        assert!(row.supported);
        assert!(!row.is_failed());
    }

    #[test]
    fn fail_remaining_keeps_recorded_outcomes() {
        let mut row = ResultRow::new("esacci.SST.x");
        row.set(ProbeKind::Open, ProbeOutcome::Yes);
        row.fail_remaining();
        assert_eq!(row.open, ProbeOutcome::Yes);
        assert_eq!(row.open_temporal, ProbeOutcome::No);
        assert_eq!(row.visualize, ProbeOutcome::No);
        assert!(row.is_failed());
    }

    #[test]
    fn unsupported_rows_are_never_failed() {
        let mut row = ResultRow::new("esacci.SST.x");
        row.supported = false;
        row.fail_remaining();
        assert!(!row.is_failed());
    }

    #[test]
    fn not_tested_is_not_a_failure() {
        let mut row = ResultRow::new("esacci.SST.x");
        for kind in ProbeKind::ALL {
            row.set(kind, ProbeOutcome::Yes);
        }
        row.set(ProbeKind::OpenTemporal, ProbeOutcome::NotTested);
        assert!(!row.is_failed());
        assert_eq!(
            row.capability_tags(),
            vec!["open", "constrain_region", "write_zarr"]
        );
    }
}
