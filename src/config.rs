//! Run configuration: defaults, then an optional YAML file, then `CCI_VERIFY_*` environment
//! overrides. Command-line flags are applied last by the CLI.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::housekeeping::DEFAULT_RETENTION_DAYS;
use crate::parallel::{default_worker_count, WorkerPool};
use crate::policy::{SupportPolicy, SupportRule};
use crate::probe::sequence::{DEFAULT_RETRY_EXTENSION_DAYS, DEFAULT_TIMEOUT};
use crate::probe::ProbeSettings;
use crate::report::ReportLayout;
use crate::sampler::entropy_seed;

pub const DEFAULT_CATALOG: &str = "cci-store";
pub const CONFIG_ENV: &str = "CCI_VERIFY_CONFIG";
pub const OUTPUT_ENV: &str = "CCI_VERIFY_OUTPUT";
pub const TIMEOUT_ENV: &str = "CCI_VERIFY_TIMEOUT_SECS";
pub const WORKERS_ENV: &str = "CCI_VERIFY_WORKERS";
pub const SEED_ENV: &str = "CCI_VERIFY_SEED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub catalog: String,
    /// Optional output subdirectory such as `smoke`.
    pub mode: Option<String>,
    pub output: PathBuf,
    /// Catalog YAML; defaults to `data/catalogs/<catalog>.yaml`.
    pub catalog_file: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Defaults to available cores minus one.
    pub workers: Option<usize>,
    pub sequential: bool,
    /// Base seed for sampling; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub retention_days: i64,
    pub retry_extension_days: Option<i64>,
    pub traceback_base_url: Option<String>,
    /// Replaces the built-in support rules when set.
    pub support_rules: Option<Vec<SupportRule>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.to_string(),
            mode: None,
            output: PathBuf::from("."),
            catalog_file: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            workers: None,
            sequential: false,
            seed: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            retry_extension_days: Some(DEFAULT_RETRY_EXTENSION_DAYS),
            traceback_base_url: None,
            support_rules: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl RunConfig {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then `file` (or `$CCI_VERIFY_CONFIG`), then the process environment.
    pub fn resolve(file: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match file.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(output) = lookup(OUTPUT_ENV) {
            self.output = PathBuf::from(output);
        }
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.timeout_secs = parse_env(TIMEOUT_ENV, value)?;
        }
        if let Some(value) = lookup(WORKERS_ENV) {
            self.workers = Some(parse_env(WORKERS_ENV, value)?);
        }
        if let Some(value) = lookup(SEED_ENV) {
            self.seed = Some(parse_env(SEED_ENV, value)?);
        }
        Ok(())
    }

    pub fn catalog_file_path(&self) -> PathBuf {
        self.catalog_file.clone().unwrap_or_else(|| {
            Path::new("data")
                .join("catalogs")
                .join(format!("{}.yaml", self.catalog))
        })
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            retry_extension_days: self.retry_extension_days,
        }
    }

    pub fn worker_pool(&self) -> WorkerPool {
        if self.sequential {
            WorkerPool::sequential()
        } else {
            WorkerPool::with_workers(self.workers.unwrap_or_else(default_worker_count))
        }
    }

    pub fn policy(&self) -> SupportPolicy {
        match &self.support_rules {
            Some(rules) => SupportPolicy::new(rules.clone()),
            None => SupportPolicy::default(),
        }
    }

    pub fn layout(&self, date: NaiveDate) -> ReportLayout {
        ReportLayout::new(&self.output, self.mode.as_deref(), &self.catalog, date)
    }

    pub fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(entropy_seed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::default();
        assert_eq!(config.catalog, "cci-store");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.retry_extension_days, Some(4));
        assert_eq!(
            config.catalog_file_path(),
            Path::new("data/catalogs/cci-store.yaml")
        );
    }

    #[test]
    fn yaml_fills_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        fs::write(&path, "catalog: odp\ntimeout_secs: 30\nsequential: true\n").unwrap();
        let config = RunConfig::load_file(&path).unwrap();
        assert_eq!(config.catalog, "odp");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.worker_pool(), WorkerPool::sequential());
        assert_eq!(config.retention_days, 14);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [(TIMEOUT_ENV, "5"), (SEED_ENV, "99"), (OUTPUT_ENV, "/tmp/out")]
            .into_iter()
            .collect();
        let mut config = RunConfig::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.base_seed(), 99);
        assert_eq!(config.output, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn malformed_environment_value_is_an_error() {
        let mut config = RunConfig::default();
        let err = config
            .apply_env(|name| (name == WORKERS_ENV).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(WORKERS_ENV));
    }

    #[test]
    fn support_rules_replace_defaults() {
        let config = RunConfig {
            support_rules: Some(vec![SupportRule::contains("OC", "no ocean colour")]),
            ..RunConfig::default()
        };
        let policy = config.policy();
        assert!(!policy.classify("esacci.OC.x").supported);
        assert!(policy.classify("esacci.SST.sinusoidal").supported);
    }
}
