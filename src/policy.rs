//! Static allow/deny classification applied before any probe runs.
//!
//! Rules are evaluated in order and the first match wins. A rule either tests for a substring of
//! the dataset id or for exact membership in a deny-list (vector data encoded as point/line
//! geometries rather than gridded fields).

use serde::{Deserialize, Serialize};

/// How a rule matches a dataset id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RulePattern {
    Contains(String),
    OneOf(Vec<String>),
}

impl RulePattern {
    pub fn matches(&self, data_id: &str) -> bool {
        match self {
            Self::Contains(fragment) => data_id.contains(fragment.as_str()),
            Self::OneOf(ids) => ids.iter().any(|id| id == data_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRule {
    pub pattern: RulePattern,
    pub reason: String,
}

impl SupportRule {
    pub fn contains(fragment: &str, reason: &str) -> Self {
        Self {
            pattern: RulePattern::Contains(fragment.to_string()),
            reason: reason.to_string(),
        }
    }

    pub fn one_of(ids: &[&str], reason: &str) -> Self {
        Self {
            pattern: RulePattern::OneOf(ids.iter().map(|id| id.to_string()).collect()),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportDecision {
    pub supported: bool,
    pub reason: Option<String>,
}

impl SupportDecision {
    pub fn supported() -> Self {
        Self {
            supported: true,
            reason: None,
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            supported: false,
            reason: Some(reason.into()),
        }
    }
}

/// Ice sheet products that ship as vector time series.
pub const VECTOR_DATA_IDS: &[&str] = &[
    "esacci.ICESHEETS.mon.IND.GMB.GRACE-instrument.GRACE.VARIOUS.1-3.greenland_gmb_time_series",
    "esacci.ICESHEETS.unspecified.Unspecified.CFL.multi-sensor.multi-platform.UNSPECIFIED.v3-0.greenland",
    "esacci.ICESHEETS.unspecified.Unspecified.GLL.multi-sensor.multi-platform.UNSPECIFIED.v1-3.greenland",
    "esacci.ICESHEETS.yr.Unspecified.GMB.GRACE-instrument.GRACE.UNSPECIFIED.1-2.greenland_gmb_timeseries",
    "esacci.ICESHEETS.yr.Unspecified.GMB.GRACE-instrument.GRACE.UNSPECIFIED.1-4.greenland_gmb_time_series",
    "esacci.ICESHEETS.yr.Unspecified.GMB.GRACE-instrument.GRACE.UNSPECIFIED.1-5.greenland_gmb_time_series",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportPolicy {
    pub rules: Vec<SupportRule>,
}

impl Default for SupportPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                SupportRule::contains(
                    "sinusoidal",
                    "There is no support for sinusoidal datasets, please use the equivalent dataset with 'geographic' in the dataset_id.",
                ),
                SupportRule::contains(
                    "L2P",
                    "There is no support for L2P datasets, because problems are expected.",
                ),
                SupportRule::contains(
                    "esacci.FIRE.mon.L3S",
                    "There is no support for FIRE L3S datasets, because problems are expected.",
                ),
                SupportRule::contains(
                    "esacci.SEALEVEL.satellite-orbit-frequency.L1",
                    "There is no support for SEALEVEL satellite-orbit-frequency datasets, because problems are expected.",
                ),
                SupportRule::one_of(VECTOR_DATA_IDS, "There is no support for vector data."),
            ],
        }
    }
}

impl SupportPolicy {
    pub fn new(rules: Vec<SupportRule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, data_id: &str) -> SupportDecision {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(data_id))
            .map(|rule| SupportDecision::unsupported(rule.reason.clone()))
            .unwrap_or_else(SupportDecision::supported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinusoidal_is_unsupported_and_points_to_geographic() {
        let decision = SupportPolicy::default().classify(
            "esacci.OC.8-days.L3S.OC_PRODUCTS.multi-sensor.multi-platform.MERGED.3-1.sinusoidal",
        );
        assert!(!decision.supported);
        assert!(decision.reason.unwrap().contains("geographic"));
    }

    #[test]
    fn vector_data_requires_exact_id() {
        let policy = SupportPolicy::default();
        assert!(!policy.classify(VECTOR_DATA_IDS[0]).supported);

        let near_miss = format!("{}.v2", VECTOR_DATA_IDS[0]);
        assert!(policy.classify(&near_miss).supported);
    }

    #[test]
    fn first_matching_rule_wins() {
        let policy = SupportPolicy::new(vec![
            SupportRule::contains("L2P", "first"),
            SupportRule::contains("SST", "second"),
        ]);
        let decision = policy.classify("esacci.SST.satellite-orbit-frequency.L2P.SSTskin");
        assert_eq!(decision.reason.as_deref(), Some("first"));
    }

    #[test]
    fn unmatched_ids_are_supported_without_reason() {
        let decision = SupportPolicy::default()
            .classify("esacci.SST.day.L4.SSTdepth.multi-sensor.multi-platform.OSTIA.1-1.r1");
        assert_eq!(decision, SupportDecision::supported());
    }

    #[test]
    fn classification_is_deterministic() {
        let policy = SupportPolicy::default();
        let id = "esacci.FIRE.mon.L3S.BA.MODIS.Terra.MODIS_TERRA.v5-1.grid";
        assert_eq!(policy.classify(id), policy.classify(id));
    }

    #[test]
    fn rules_parse_from_yaml() {
        let yaml = r#"
rules:
  - pattern: { kind: contains, value: L2P }
    reason: no L2P
  - pattern: { kind: one_of, value: [a.b.c] }
    reason: vector
"#;
        let policy: SupportPolicy = serde_yaml::from_str(yaml).unwrap();
        assert!(!policy.classify("a.b.c").supported);
        assert!(!policy.classify("x.L2P.y").supported);
    }
}
