//! Phase 2 (verification) inputs and results

use std::fmt;

use crate::device::{DeviceId, DeviceRole};
use crate::reset::ResetResult;
use crate::time::format_delta;

/// A device eligible for verification
///
/// Only devices with a recorded reset timestamp can be verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyTarget {
    pub device_id: DeviceId,
    pub role: DeviceRole,
    pub reset_timestamp: i64,
}

impl ResetResult {
    /// Phase 2 input for this device, if the reset was acknowledged
    pub fn verify_target(&self) -> Option<VerifyTarget> {
        self.reset_timestamp.map(|reset_timestamp| VerifyTarget {
            device_id: self.device_id.clone(),
            role: self.role,
            reset_timestamp,
        })
    }
}

/// Verification classification, most significant problem first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Verified,
    AlarmActive,
    TimestampStale,
    IncXOutOfRange,
    IncYOutOfRange,
    ReadFailed,
    Cancelled,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::AlarmActive => "alarm_active",
            Self::TimestampStale => "timestamp_stale",
            Self::IncXOutOfRange => "inc_x_out_of_range",
            Self::IncYOutOfRange => "inc_y_out_of_range",
            Self::ReadFailed => "read_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the verification workflow for one device
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyResult {
    pub device_id: DeviceId,
    pub role: DeviceRole,
    pub reset_timestamp: i64,

    /// Newest timestamp among the registers read
    pub data_timestamp: Option<i64>,

    pub alarm_incl: Option<bool>,
    pub inc_x_avg: Option<f64>,
    pub inc_y_avg: Option<f64>,

    pub alarm_ok: bool,
    pub inc_x_ok: bool,
    pub inc_y_ok: bool,
    pub timestamp_valid: bool,
    pub all_ok: bool,

    /// `data_timestamp - reset_timestamp`
    pub timestamp_delta_ms: Option<i64>,

    pub status: VerifyStatus,
    pub error_message: String,
}

impl VerifyResult {
    /// Empty result, every check false
    pub fn empty(target: &VerifyTarget, status: VerifyStatus) -> Self {
        Self {
            device_id: target.device_id.clone(),
            role: target.role,
            reset_timestamp: target.reset_timestamp,
            data_timestamp: None,
            alarm_incl: None,
            inc_x_avg: None,
            inc_y_avg: None,
            alarm_ok: false,
            inc_x_ok: false,
            inc_y_ok: false,
            timestamp_valid: false,
            all_ok: false,
            timestamp_delta_ms: None,
            status,
            error_message: String::new(),
        }
    }

    /// The register read failed; no values are available
    pub fn read_failed(target: &VerifyTarget, reason: impl Into<String>) -> Self {
        let mut result = Self::empty(target, VerifyStatus::ReadFailed);
        result.error_message = reason.into();
        result
    }

    pub fn cancelled(target: &VerifyTarget) -> Self {
        let mut result = Self::empty(target, VerifyStatus::Cancelled);
        result.error_message = "cancelled".into();
        result
    }

    pub fn timestamp_delta_readable(&self) -> String {
        self.timestamp_delta_ms.map(format_delta).unwrap_or_default()
    }

    /// Human-readable list of failed checks
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.alarm_ok {
            issues.push(match self.alarm_incl {
                Some(_) => "alarm active".to_string(),
                None => "alarm missing".to_string(),
            });
        }
        if !self.inc_x_ok {
            issues.push(match self.inc_x_avg {
                Some(v) => format!("Inc X={:.3}", v),
                None => "Inc X missing".to_string(),
            });
        }
        if !self.inc_y_ok {
            issues.push(match self.inc_y_avg {
                Some(v) => format!("Inc Y={:.3}", v),
                None => "Inc Y missing".to_string(),
            });
        }
        if !self.timestamp_valid {
            issues.push("stale data".to_string());
        }

        issues
    }

    /// Derive status and message from the computed checks
    pub fn classify(&mut self) -> VerifyStatus {
        self.status = if self.all_ok {
            VerifyStatus::Verified
        } else if !self.alarm_ok {
            VerifyStatus::AlarmActive
        } else if !self.timestamp_valid {
            VerifyStatus::TimestampStale
        } else if !self.inc_x_ok {
            VerifyStatus::IncXOutOfRange
        } else {
            VerifyStatus::IncYOutOfRange
        };
        self.error_message = self.issues().join("; ");
        self.status
    }
}
