//! Device lists and phase 2 targets read from CSV
//!
//! Header names are matched case-insensitively against the aliases in
//! [`DEVICE_COLUMNS`]; an optional `tipo` or `role` column gives the device
//! role. A file whose first cell is already a device id has no header row.
//! When a header is present but no alias matches, the first column is used.
//! Blank rows are ignored, malformed and duplicate ids are rejected and
//! reported.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use digil_types::{DeviceId, DeviceRecord, DeviceRole, ResetResult, VerifyTarget};

use crate::error::{Error, Result};

/// Accepted names for the device id column, in priority order
pub const DEVICE_COLUMNS: [&str; 6] = ["deviceid", "device_id", "clientid", "client_id", "id", "device"];
const ROLE_COLUMNS: [&str; 2] = ["tipo", "role"];
const RESET_TIMESTAMP_COLUMN: &str = "reset_timestamp";

/// An input row that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// 1-based line number in the file, header included
    pub line: u64,
    pub value: String,
    pub reason: String,
}

/// Devices loaded for a reset or status run
#[derive(Debug, Default)]
pub struct DeviceList {
    pub devices: Vec<DeviceRecord>,
    pub rejected: Vec<Rejection>,
}

/// Phase 2 input
#[derive(Debug, Default)]
pub struct VerifyTargets {
    pub targets: Vec<VerifyTarget>,

    /// Devices without a reset timestamp
    pub excluded: Vec<DeviceId>,

    pub rejected: Vec<Rejection>,
}

/// Column positions resolved from the first row
#[derive(Debug, PartialEq, Eq)]
struct Columns {
    device: usize,
    role: Option<usize>,
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Rows of a device file with the header, if any, split off
struct Table {
    columns: Columns,
    header: Option<StringRecord>,
    rows: Vec<StringRecord>,
}

impl Table {
    /// `None` for an empty file
    fn read<R: Read>(input: R) -> Result<Option<Self>> {
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input)
            .into_records();

        let Some(first) = records.next().transpose()? else {
            return Ok(None);
        };

        let mut rows = Vec::new();
        let (columns, header) = if let Some(device) = find_column(&first, &DEVICE_COLUMNS) {
            let role = find_column(&first, &ROLE_COLUMNS);
            (Columns { device, role }, Some(first))
        } else if DeviceId::parse(first.get(0).unwrap_or_default()).is_ok() {
            debug!("No header row, reading device ids from the first column");
            rows.push(first);
            (Columns { device: 0, role: None }, None)
        } else {
            warn!(
                "No device id column found, using first column '{}'",
                first.get(0).unwrap_or_default()
            );
            let role = find_column(&first, &ROLE_COLUMNS);
            (Columns { device: 0, role }, Some(first))
        };

        for record in records {
            rows.push(record?);
        }

        Ok(Some(Self {
            columns,
            header,
            rows,
        }))
    }
}

/// Parses rows, collecting rejections and tracking duplicates
struct RowParser {
    columns: Columns,
    default_role: DeviceRole,
    seen: HashSet<DeviceId>,
    defaulted: usize,
    rejected: Vec<Rejection>,
}

impl RowParser {
    fn new(columns: Columns, default_role: DeviceRole) -> Self {
        Self {
            columns,
            default_role,
            seen: HashSet::new(),
            defaulted: 0,
            rejected: Vec::new(),
        }
    }

    fn reject(&mut self, line: u64, value: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Line {}: skipping '{}': {}", line, value, reason);
        self.rejected.push(Rejection {
            line,
            value: value.to_string(),
            reason,
        });
    }

    /// `None` for blank or rejected rows
    fn parse(&mut self, record: &StringRecord) -> Option<(DeviceId, DeviceRole)> {
        let line = record.position().map_or(0, |p| p.line());
        let raw = record.get(self.columns.device).unwrap_or_default();

        if raw.is_empty() {
            return None;
        }

        let id = match DeviceId::parse(raw) {
            Ok(id) => id,
            Err(e) => {
                self.reject(line, raw, e.to_string());
                return None;
            }
        };

        let role = match self.columns.role.and_then(|i| record.get(i)) {
            Some(value) if !value.is_empty() => match value.parse::<DeviceRole>() {
                Ok(role) => role,
                Err(e) => {
                    self.reject(line, raw, e.to_string());
                    return None;
                }
            },
            _ => {
                self.defaulted += 1;
                self.default_role
            }
        };

        if !self.seen.insert(id.clone()) {
            self.reject(line, raw, "duplicate device id");
            return None;
        }

        Some((id, role))
    }

    fn finish(&self) {
        if self.defaulted > 0 {
            warn!(
                "{} devices have no role column value, assuming {}",
                self.defaulted, self.default_role
            );
        }
    }
}

/// Read a device list
pub fn read_devices<R: Read>(input: R, default_role: DeviceRole) -> Result<DeviceList> {
    let Some(table) = Table::read(input)? else {
        return Ok(DeviceList::default());
    };

    let mut parser = RowParser::new(table.columns, default_role);
    let mut devices = Vec::new();

    for record in &table.rows {
        if let Some((id, role)) = parser.parse(record) {
            devices.push(DeviceRecord::new(id, role));
        }
    }
    parser.finish();

    debug!("{} devices loaded, {} rejected", devices.len(), parser.rejected.len());

    Ok(DeviceList {
        devices,
        rejected: parser.rejected,
    })
}

pub fn load_devices(path: &Path, default_role: DeviceRole) -> Result<DeviceList> {
    read_devices(File::open(path)?, default_role)
}

/// Read phase 2 targets from a phase 1 export
///
/// Rows with an empty `reset_timestamp` are excluded; negative or
/// non-numeric values are rejected.
pub fn read_verify_targets<R: Read>(input: R, default_role: DeviceRole) -> Result<VerifyTargets> {
    let missing = || Error::MissingColumn(RESET_TIMESTAMP_COLUMN.into());

    let table = Table::read(input)?.ok_or_else(missing)?;
    let timestamp_column = table
        .header
        .as_ref()
        .and_then(|header| find_column(header, &[RESET_TIMESTAMP_COLUMN]))
        .ok_or_else(missing)?;

    let mut parser = RowParser::new(table.columns, default_role);
    let mut out = VerifyTargets::default();

    for record in &table.rows {
        let Some((device_id, role)) = parser.parse(record) else {
            continue;
        };

        let raw = record.get(timestamp_column).unwrap_or_default();
        if raw.is_empty() {
            out.excluded.push(device_id);
            continue;
        }

        match raw.parse::<i64>() {
            Ok(reset_timestamp) if reset_timestamp >= 0 => out.targets.push(VerifyTarget {
                device_id,
                role,
                reset_timestamp,
            }),
            _ => {
                let line = record.position().map_or(0, |p| p.line());
                parser.reject(line, device_id.as_str(), format!("invalid reset timestamp '{}'", raw));
            }
        }
    }
    parser.finish();

    if !out.excluded.is_empty() {
        warn!("{} devices have no reset timestamp and are excluded", out.excluded.len());
    }

    out.rejected = parser.rejected;
    Ok(out)
}

pub fn load_verify_targets(path: &Path, default_role: DeviceRole) -> Result<VerifyTargets> {
    read_verify_targets(File::open(path)?, default_role)
}

/// Phase 2 targets straight from phase 1 results
pub fn targets_from_results(results: &[ResetResult]) -> VerifyTargets {
    let mut out = VerifyTargets::default();
    for result in results {
        match result.verify_target() {
            Some(target) => out.targets.push(target),
            None => out.excluded.push(result.device_id.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use digil_types::StepOutcome;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_devices_with_roles() {
        let csv = "\
DeviceID,Tipo,notes
1121621_0436,master,north
1121525_0103,SLAVE,
1121622_0364,,
";
        let list = read_devices(csv.as_bytes(), DeviceRole::Slave).unwrap();

        let loaded: Vec<_> = list
            .devices
            .iter()
            .map(|d| (d.id.as_str().to_string(), d.role))
            .collect();
        assert_eq!(
            loaded,
            vec![
                ("1121621_0436".to_string(), DeviceRole::Master),
                ("1121525_0103".to_string(), DeviceRole::Slave),
                ("1121622_0364".to_string(), DeviceRole::Slave),
            ]
        );
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn test_alias_and_default_role() {
        let csv = "device_id\n1121621_0436\n";
        let list = read_devices(csv.as_bytes(), DeviceRole::Master).unwrap();
        assert_eq!(list.devices.len(), 1);
        assert_eq!(list.devices[0].role, DeviceRole::Master);
    }

    #[test]
    fn test_unknown_header_uses_first_column() {
        let csv = "serial,notes\n1121621_0436,north\n123,south\n";
        let list = read_devices(csv.as_bytes(), DeviceRole::Slave).unwrap();

        assert_eq!(list.devices.len(), 1);
        assert_eq!(list.devices[0].id.as_str(), "1121621_0436");
        assert_eq!(list.rejected.len(), 1);
        assert_eq!(list.rejected[0].value, "123");
    }

    #[test]
    fn test_headerless_file() {
        let list = read_devices("1121621_0436\n1121525_0103\n".as_bytes(), DeviceRole::Slave)
            .unwrap();

        let ids: Vec<_> = list.devices.iter().map(|d| d.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["1121621_0436", "1121525_0103"]);
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn test_client_id_alias() {
        let csv = "Name,ClientID\nnorth,1121621_0436\n";
        let list = read_devices(csv.as_bytes(), DeviceRole::Slave).unwrap();
        assert_eq!(list.devices.len(), 1);
        assert_eq!(list.devices[0].id.as_str(), "1121621_0436");
    }

    #[test]
    fn test_empty_file() {
        let list = read_devices("".as_bytes(), DeviceRole::Slave).unwrap();
        assert!(list.devices.is_empty());
    }

    #[test]
    fn test_rejections_reported() {
        let csv = "\
deviceid,role
1121621_0436,master

not-an-id,slave
1121621_0436,slave
1121525_0103,gateway
";
        let list = read_devices(csv.as_bytes(), DeviceRole::Slave).unwrap();

        assert_eq!(list.devices.len(), 1);
        let reasons: Vec<_> = list.rejected.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(reasons, vec!["not-an-id", "1121621_0436", "1121525_0103"]);
        assert_eq!(list.rejected[1].reason, "duplicate device id");
        assert!(list.rejected[0].line > 1);
    }

    #[test]
    fn test_read_verify_targets() {
        let csv = "\
deviceid,tipo,manutenzione_on,reset_inclinometro,manutenzione_off,reset_timestamp,reset_datetime,status,error_message
1121621_0436,master,OK,OK,OK,1700000000000,2023-11-14 22:13:20,success,
1121525_0103,slave,FAIL,SKIP,SKIP,,,failed,maintenance ON: timeout
1121622_0364,slave,OK,OK,FAIL,1700000005000,2023-11-14 22:13:25,partial,maintenance OFF: HTTP 500
1121622_0365,slave,OK,OK,OK,yesterday,,success,
1121622_0366,slave,OK,OK,OK,-1000,,success,
";
        let targets = read_verify_targets(csv.as_bytes(), DeviceRole::Slave).unwrap();

        assert_eq!(targets.targets.len(), 2);
        assert_eq!(targets.targets[0].role, DeviceRole::Master);
        assert_eq!(targets.targets[1].reset_timestamp, 1_700_000_005_000);
        assert_eq!(targets.excluded, vec![DeviceId::parse("1121525_0103").unwrap()]);
        assert_eq!(targets.rejected.len(), 2);
        assert!(targets.rejected[0].reason.contains("yesterday"));
        assert!(targets.rejected[1].reason.contains("-1000"));
    }

    #[test]
    fn test_verify_targets_need_timestamp_column() {
        let err = read_verify_targets("deviceid\n1121621_0436\n".as_bytes(), DeviceRole::Slave)
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));

        let err = read_verify_targets("1121621_0436\n".as_bytes(), DeviceRole::Slave).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "reset_timestamp"));
    }

    #[test]
    fn test_targets_from_results() {
        let ok_id = DeviceId::parse("1121621_0436").unwrap();
        let mut ok = ResetResult::new(ok_id.clone(), DeviceRole::Master);
        ok.maintenance_on = StepOutcome::Success;
        ok.record_reset(42);

        let failed = ResetResult::new(DeviceId::parse("1121525_0103").unwrap(), DeviceRole::Slave);

        let targets = targets_from_results(&[ok, failed]);
        assert_eq!(targets.targets.len(), 1);
        assert_eq!(targets.targets[0].device_id, ok_id);
        assert_eq!(targets.targets[0].reset_timestamp, 42);
        assert_eq!(targets.excluded.len(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.csv");
        std::fs::write(&path, "deviceid\n1121621_0436\n1121525_0103\n").unwrap();

        let list = load_devices(&path, DeviceRole::Slave).unwrap();
        assert_eq!(list.devices.len(), 2);
    }
}
