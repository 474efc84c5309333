//! Per-phase totals

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use tracing::info;

use crate::orchestrator::{PhaseOutput, PhaseReport};

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub phase: String,

    /// Devices with a result row
    pub processed: usize,

    pub succeeded: usize,

    /// Result count per status label
    pub by_status: BTreeMap<String, usize>,

    pub not_dispatched: usize,

    /// Input rows rejected or excluded before the run
    pub skipped: usize,

    pub generated_at: DateTime<Local>,
}

impl PhaseSummary {
    pub fn from_report<I, O: PhaseOutput>(
        phase: impl Into<String>,
        report: &PhaseReport<I, O>,
        skipped: usize,
    ) -> Self {
        let mut by_status = BTreeMap::new();
        for result in &report.results {
            *by_status.entry(result.status_label()).or_insert(0) += 1;
        }

        Self {
            phase: phase.into(),
            processed: report.results.len(),
            succeeded: report.results.iter().filter(|r| r.is_success()).count(),
            by_status,
            not_dispatched: report.not_dispatched.len(),
            skipped,
            generated_at: Local::now(),
        }
    }

    /// Percentage of processed devices that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.succeeded as f64 * 100.0 / self.processed as f64
    }

    pub fn log(&self) {
        info!(
            "{} summary: {}/{} succeeded ({:.1}%)",
            self.phase,
            self.succeeded,
            self.processed,
            self.success_rate()
        );
        for (status, count) in &self.by_status {
            info!("  {}: {}", status, count);
        }
        if self.not_dispatched > 0 {
            info!("  not dispatched: {}", self.not_dispatched);
        }
        if self.skipped > 0 {
            info!("  skipped from input: {}", self.skipped);
        }
    }

    /// `(metric, value)` rows for export
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("phase".to_string(), self.phase.clone()),
            ("processed".to_string(), self.processed.to_string()),
            ("succeeded".to_string(), self.succeeded.to_string()),
            ("success_rate".to_string(), format!("{:.1}%", self.success_rate())),
        ];
        rows.extend(
            self.by_status
                .iter()
                .map(|(status, count)| (format!("status_{}", status), count.to_string())),
        );
        rows.push(("not_dispatched".to_string(), self.not_dispatched.to_string()));
        rows.push(("skipped".to_string(), self.skipped.to_string()));
        rows.push((
            "generated_at".to_string(),
            self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ));
        rows
    }
}
