//! Result spreadsheets (CSV)

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use csv::Writer;
use tracing::info;

use digil_types::{
    MaintenanceCheck, PENDING_SLOTS, QueueCheck, ResetResult, SENT_SLOTS, VerifyResult,
};

use crate::error::Result;
use crate::summary::PhaseSummary;

/// File name prefixes for timestamped exports
pub const RESET_EXPORT_PREFIX: &str = "Reset_Inclinometro_Fase1";
pub const VERIFY_EXPORT_PREFIX: &str = "Verifica_Inclinometro_Fase2";
pub const STATUS_EXPORT_PREFIX: &str = "Stato_Manutenzione";
pub const QUEUE_EXPORT_PREFIX: &str = "Command_Queue";

/// A type exported as one CSV row
pub trait CsvRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

fn ok_fail(ok: bool) -> String {
    let label = if ok { "OK" } else { "FAIL" };
    label.to_string()
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl CsvRow for ResetResult {
    fn headers() -> &'static [&'static str] {
        &[
            "deviceid",
            "tipo",
            "manutenzione_on",
            "reset_inclinometro",
            "manutenzione_off",
            "reset_timestamp",
            "reset_datetime",
            "status",
            "error_message",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.device_id.to_string(),
            self.role.to_string(),
            self.maintenance_on.to_string(),
            self.reset.to_string(),
            self.maintenance_off.to_string(),
            optional(self.reset_timestamp),
            self.reset_datetime.clone().unwrap_or_default(),
            self.status.to_string(),
            self.error_message(),
        ]
    }
}

impl CsvRow for VerifyResult {
    fn headers() -> &'static [&'static str] {
        &[
            "deviceid",
            "all_ok",
            "alarm_incl",
            "alarm_ok",
            "inc_x_avg",
            "inc_x_ok",
            "inc_y_avg",
            "inc_y_ok",
            "timestamp_valid",
            "timestamp_delta_readable",
            "status",
            "error_message",
            "reset_timestamp",
            "data_timestamp",
            "timestamp_delta_ms",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.device_id.to_string(),
            ok_fail(self.all_ok),
            optional(self.alarm_incl),
            ok_fail(self.alarm_ok),
            optional(self.inc_x_avg),
            ok_fail(self.inc_x_ok),
            optional(self.inc_y_avg),
            ok_fail(self.inc_y_ok),
            ok_fail(self.timestamp_valid),
            self.timestamp_delta_readable(),
            self.status.to_string(),
            self.error_message.clone(),
            self.reset_timestamp.to_string(),
            optional(self.data_timestamp),
            optional(self.timestamp_delta_ms),
        ]
    }
}

impl CsvRow for MaintenanceCheck {
    fn headers() -> &'static [&'static str] {
        &["deviceid", "maintenance_status", "error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.device_id.to_string(),
            self.status_label(),
            self.error.clone(),
        ]
    }
}

/// Placeholder for unused command slots
const EMPTY_SLOT: &str = "N/A";

fn slots(commands: &[String], count: usize) -> impl Iterator<Item = String> + '_ {
    (0..count).map(move |i| commands.get(i).cloned().unwrap_or_else(|| EMPTY_SLOT.to_string()))
}

impl CsvRow for QueueCheck {
    fn headers() -> &'static [&'static str] {
        &[
            "deviceid", "queue_status", "pending_1", "pending_2", "pending_3", "pending_4",
            "pending_5", "sent_1", "sent_2", "sent_3", "sent_4", "sent_5", "sent_6", "sent_7",
            "sent_8", "sent_9", "sent_10", "error",
        ]
    }

    fn row(&self) -> Vec<String> {
        let mut row = vec![self.device_id.to_string(), self.status_label()];
        row.extend(slots(&self.log.pending, PENDING_SLOTS));
        row.extend(slots(&self.log.sent, SENT_SLOTS));
        row.push(self.error.clone());
        row
    }
}

/// Write a header and one row per item
pub fn write_rows<W: Write, T: CsvRow>(output: W, items: &[T]) -> Result<()> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(T::headers())?;
    for item in items {
        writer.write_record(item.row())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_rows<T: CsvRow>(path: &Path, items: &[T]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_rows(file, items)?;
    info!("Exported {} rows to {}", items.len(), path.display());
    Ok(())
}

pub fn write_summary<W: Write>(output: W, summary: &PhaseSummary) -> Result<()> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["metric", "value"])?;
    for (metric, value) in summary.rows() {
        writer.write_record([metric, value])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_summary(path: &Path, summary: &PhaseSummary) -> Result<()> {
    write_summary(std::fs::File::create(path)?, summary)?;
    info!("Summary written to {}", path.display());
    Ok(())
}

/// `<prefix>_YYYYMMDD_HHMMSS.csv`
pub fn timestamped_name(prefix: &str, at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}_{}.csv", prefix, at.format("%Y%m%d_%H%M%S")))
}

/// `results.csv` -> `results_summary.csv`, next to the results file
pub fn summary_path(results: &Path) -> PathBuf {
    let stem = results
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    results.with_file_name(format!("{}_summary.csv", stem))
}
