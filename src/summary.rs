//! Per-category and global roll-up of a report.

use std::fs;
use std::path::Path;

use crate::probe::{ProbeKind, ProbeOutcome};
use crate::report::{ReportError, ResultRow};

/// Scope covering every row regardless of category.
pub const ALL_ECVS: &str = "ALL_ECVS";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeTally {
    pub success: usize,
    pub failed: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub ecv: String,
    pub supported: usize,
    pub not_supported: usize,
    pub supported_percentage: f64,
    /// One tally per probe, in [ProbeKind::ALL] order.
    pub probes: [ProbeTally; 5],
    pub total: usize,
}

impl SummaryRow {
    pub fn tally(&self, kind: ProbeKind) -> ProbeTally {
        let index = ProbeKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        self.probes[index]
    }

    pub fn header() -> Vec<String> {
        let mut header = vec![
            "ecv".to_string(),
            "supported".to_string(),
            "not_supported".to_string(),
            "supported_percentage".to_string(),
        ];
        for kind in ProbeKind::ALL {
            let name = kind.summary_name();
            header.push(name.to_string());
            header.push(format!("{name}_failed"));
            header.push(format!("{name}_percentage"));
        }
        header.push("total".to_string());
        header
    }

    pub fn record(&self) -> Vec<String> {
        let mut record = vec![
            self.ecv.clone(),
            self.supported.to_string(),
            self.not_supported.to_string(),
            format!("{:.1}", self.supported_percentage),
        ];
        for tally in &self.probes {
            record.push(tally.success.to_string());
            record.push(tally.failed.to_string());
            record.push(format!("{:.1}", tally.percentage));
        }
        record.push(self.total.to_string());
        record
    }
}

/// `100 * part / whole` rounded to one decimal; a zero `whole` yields 0.0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (1000.0 * part as f64 / whole as f64).round() / 10.0
}

/// Roll up the rows of one category, or of all rows for [ALL_ECVS].
///
/// Probe tallies count supported rows only; `not_tested` counts as failed. The supported
/// percentage is over every row in scope, probe percentages over the supported ones.
pub fn aggregate(rows: &[ResultRow], ecv: &str) -> SummaryRow {
    let in_scope: Vec<&ResultRow> = rows
        .iter()
        .filter(|row| ecv == ALL_ECVS || row.ecv == ecv)
        .collect();
    let total = in_scope.len();
    let supported = in_scope.iter().filter(|row| row.supported).count();
    let not_supported = total - supported;
    let tested = total - not_supported;

    let probes = ProbeKind::ALL.map(|kind| {
        let success = in_scope
            .iter()
            .filter(|row| row.supported && row.outcome(kind) == ProbeOutcome::Yes)
            .count();
        ProbeTally {
            success,
            failed: supported - success,
            percentage: percentage(success, tested),
        }
    });

    SummaryRow {
        ecv: ecv.to_string(),
        supported,
        not_supported,
        supported_percentage: percentage(supported, total),
        probes,
        total,
    }
}

/// Categories in order of first appearance, followed by [ALL_ECVS].
pub fn ecv_list(rows: &[ResultRow]) -> Vec<String> {
    let mut ecvs: Vec<String> = Vec::new();
    for row in rows {
        if !ecvs.iter().any(|e| e == &row.ecv) {
            ecvs.push(row.ecv.clone());
        }
    }
    ecvs.push(ALL_ECVS.to_string());
    ecvs
}

pub fn summarize(rows: &[ResultRow]) -> Vec<SummaryRow> {
    ecv_list(rows)
        .iter()
        .map(|ecv| aggregate(rows, ecv))
        .collect()
}

pub fn write_summary(path: &Path, summary: &[SummaryRow]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| ReportError::csv(path, e))?;
    writer
        .write_record(SummaryRow::header())
        .map_err(|e| ReportError::csv(path, e))?;
    for row in summary {
        writer
            .write_record(row.record())
            .map_err(|e| ReportError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ReportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, supported: bool, outcome: ProbeOutcome) -> ResultRow {
        let mut row = ResultRow::new(id);
        row.supported = supported;
        for kind in ProbeKind::ALL {
            row.set(kind, outcome);
        }
        row
    }

    #[test]
    fn percentages_round_to_one_decimal() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn unsupported_rows_leave_probe_denominator() {
        let rows = vec![
            row("esacci.SST.a", true, ProbeOutcome::Yes),
            row("esacci.SST.b", true, ProbeOutcome::No),
            row("esacci.SST.c", false, ProbeOutcome::No),
            row("esacci.SST.d", false, ProbeOutcome::No),
        ];
        let summary = aggregate(&rows, "SST");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.supported, 2);
        assert_eq!(summary.supported_percentage, 50.0);
        let open = summary.tally(ProbeKind::Open);
        assert_eq!((open.success, open.failed), (1, 1));
        assert_eq!(open.percentage, 50.0);
    }

    #[test]
    fn all_unsupported_category_yields_zero_percentages() {
        let rows = vec![row("esacci.FIRE.a", false, ProbeOutcome::No)];
        let summary = aggregate(&rows, "FIRE");
        assert_eq!(summary.supported_percentage, 0.0);
        assert!(summary.probes.iter().all(|t| t.percentage == 0.0));
    }

    #[test]
    fn category_match_is_exact() {
        let rows = vec![
            row("esacci.SST.a", true, ProbeOutcome::Yes),
            row("esacci.SSTX.a", true, ProbeOutcome::Yes),
        ];
        assert_eq!(aggregate(&rows, "SST").total, 1);
        assert_eq!(aggregate(&rows, ALL_ECVS).total, 2);
    }

    #[test]
    fn ecv_list_keeps_first_appearance_then_sentinel() {
        let rows = vec![
            row("esacci.SST.a", true, ProbeOutcome::Yes),
            row("esacci.OC.a", true, ProbeOutcome::Yes),
            row("esacci.SST.b", true, ProbeOutcome::Yes),
        ];
        assert_eq!(ecv_list(&rows), vec!["SST", "OC", ALL_ECVS]);
    }

    #[test]
    fn header_and_record_have_matching_width() {
        let summary = aggregate(&[row("esacci.SST.a", true, ProbeOutcome::Yes)], ALL_ECVS);
        assert_eq!(SummaryRow::header().len(), summary.record().len());
        assert_eq!(SummaryRow::header()[4], "open");
        assert_eq!(summary.record()[3], "100.0");
    }
}
