//! Per-dataset probe sequence and its vocabulary.

pub mod comment;
pub mod deadline;
pub mod sequence;
pub mod traceback;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;

pub use comment::{label_segments, merge_probe_comments};
pub use deadline::{run_with_deadline, DeadlineError};
pub use sequence::{ProbeSequence, ProbeSettings};
pub use traceback::TracebackLog;

/// Recorded state of one probe. `NotTested` is distinct from an explicit `No`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Yes,
    No,
    #[default]
    NotTested,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::NotTested => "not_tested",
        }
    }

    pub fn is_yes(&self) -> bool {
        *self == Self::Yes
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeOutcome {
    type Err = String;

    /// Exact match only; `"yes, but"` is not `yes`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "not_tested" => Ok(Self::NotTested),
            other => Err(format!("unknown probe outcome '{other}'")),
        }
    }
}

/// The five recorded capability checks, in report column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeKind {
    Open,
    OpenTemporal,
    OpenSpatial,
    Cache,
    Visualize,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 5] = [
        ProbeKind::Open,
        ProbeKind::OpenTemporal,
        ProbeKind::OpenSpatial,
        ProbeKind::Cache,
        ProbeKind::Visualize,
    ];

    /// Column header in the per-dataset report.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Open => "open(1)",
            Self::OpenTemporal => "open_temp(2)",
            Self::OpenSpatial => "open_bbox(3)",
            Self::Cache => "cache(4)",
            Self::Visualize => "map(5)",
        }
    }

    /// Column prefix in the summary report.
    pub fn summary_name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::OpenTemporal => "open_temp",
            Self::OpenSpatial => "open_bbox",
            Self::Cache => "cache",
            Self::Visualize => "map",
        }
    }

    /// Tag published in the verification-flags file when the probe passed.
    pub fn capability_tag(&self) -> Option<&'static str> {
        match self {
            Self::Open => Some("open"),
            Self::OpenTemporal => Some("constrain_time"),
            Self::OpenSpatial => Some("constrain_region"),
            Self::Cache => Some("write_zarr"),
            Self::Visualize => None,
        }
    }
}

/// Which open attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStage {
    Unconstrained,
    Temporal,
    Spatial,
    Combined,
}

impl OpenStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconstrained => "unconstrained",
            Self::Temporal => "temporal",
            Self::Spatial => "spatial",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for OpenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can go wrong for a dataset. The display text is the report comment.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeFailure {
    #[error("{0}")]
    Unsupported(String),

    #[error("Testing only supports datasets. For \"{data_id}\", only available type specifiers \"{offered:?}\" were found.")]
    WrongType { data_id: String, offered: Vec<String> },

    #[error("Failed getting data description for {data_id} with: {source}")]
    Describe {
        data_id: String,
        source: CatalogError,
    },

    /// Details live in the side-file `reference` points to.
    #[error("{reference}")]
    Open {
        stage: OpenStage,
        reference: String,
        source: CatalogError,
    },

    #[error("Requested variables {requested:?} for subset are not in dataset.")]
    MissingVariables { requested: Vec<String> },

    #[error("{0}")]
    Processing(String),

    #[error("{0}")]
    Visualization(String),

    #[error("{local_id}: Failed saving to disc with: {source}")]
    CacheAccess {
        local_id: String,
        source: CatalogError,
    },

    #[error("Failed saving to disc with: {0}")]
    Cache(String),

    #[error("Time out after {seconds} seconds.")]
    Timeout { seconds: f64 },

    #[error("Probe worker stopped unexpectedly: {0}")]
    Aborted(String),
}

impl From<DeadlineError> for ProbeFailure {
    fn from(err: DeadlineError) -> Self {
        match err {
            DeadlineError::Expired(limit) => Self::Timeout {
                seconds: limit.as_secs_f64(),
            },
            other => Self::Aborted(other.to_string()),
        }
    }
}

/// Outcome of one probe plus its diagnostic comment, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub outcome: ProbeOutcome,
    pub comment: Option<String>,
}

impl ProbeResult {
    pub fn passed() -> Self {
        Self {
            outcome: ProbeOutcome::Yes,
            comment: None,
        }
    }

    /// Passed, with an informational note.
    pub fn passed_with(note: Option<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Yes,
            comment: note,
        }
    }

    pub fn failed(failure: &ProbeFailure) -> Self {
        Self {
            outcome: ProbeOutcome::No,
            comment: Some(failure.to_string()),
        }
    }

    pub fn not_tested(note: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::NotTested,
            comment: Some(note.into()),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome.is_yes()
    }

    pub fn from_attempt(attempt: Result<(), ProbeFailure>) -> Self {
        match attempt {
            Ok(()) => Self::passed(),
            Err(failure) => Self::failed(&failure),
        }
    }
}
