//! Phase 1 (reset) results

use std::fmt;

use crate::device::{DeviceId, DeviceRole};
use crate::time::format_datetime;

/// The three commands sent to a device during a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    MaintenanceOn,
    Reset,
    MaintenanceOff,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MaintenanceOn => "maintenance ON",
            Self::Reset => "inclinometer reset",
            Self::MaintenanceOff => "maintenance OFF",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
    Skipped,
}

impl StepOutcome {
    /// Spreadsheet value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Failure => "FAIL",
            Self::Skipped => "SKIP",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of a device reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStatus {
    /// All three steps succeeded
    Success,

    /// Reset succeeded, maintenance OFF did not
    Partial,

    /// Reset did not succeed
    Failed,

    /// Interrupted by the cancellation signal
    Cancelled,
}

impl ResetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ResetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: Step,
    pub reason: String,
}

/// Result of the reset workflow for one device
#[derive(Debug, Clone, PartialEq)]
pub struct ResetResult {
    pub device_id: DeviceId,
    pub role: DeviceRole,

    pub maintenance_on: StepOutcome,
    pub reset: StepOutcome,
    pub maintenance_off: StepOutcome,

    /// Epoch milliseconds at which the reset write was acknowledged
    pub reset_timestamp: Option<i64>,

    /// Local time rendering of `reset_timestamp`
    pub reset_datetime: Option<String>,

    pub status: ResetStatus,
    pub failures: Vec<StepFailure>,
}

impl ResetResult {
    /// Fresh result with every step skipped
    pub fn new(device_id: DeviceId, role: DeviceRole) -> Self {
        Self {
            device_id,
            role,
            maintenance_on: StepOutcome::Skipped,
            reset: StepOutcome::Skipped,
            maintenance_off: StepOutcome::Skipped,
            reset_timestamp: None,
            reset_datetime: None,
            status: ResetStatus::Failed,
            failures: Vec::new(),
        }
    }

    pub fn set_outcome(&mut self, step: Step, outcome: StepOutcome) {
        match step {
            Step::MaintenanceOn => self.maintenance_on = outcome,
            Step::Reset => self.reset = outcome,
            Step::MaintenanceOff => self.maintenance_off = outcome,
        }
    }

    /// Record a failed step together with its reason
    pub fn fail_step(&mut self, step: Step, reason: impl Into<String>) {
        self.set_outcome(step, StepOutcome::Failure);
        self.failures.push(StepFailure {
            step,
            reason: reason.into(),
        });
    }

    /// Record the acknowledged reset write
    pub fn record_reset(&mut self, acknowledged_at_ms: i64) {
        self.reset = StepOutcome::Success;
        self.reset_timestamp = Some(acknowledged_at_ms);
        self.reset_datetime = format_datetime(acknowledged_at_ms);
    }

    /// Derive the terminal status from the step outcomes
    pub fn classify(&mut self, cancelled: bool) -> ResetStatus {
        self.status = if cancelled {
            ResetStatus::Cancelled
        } else if !self.reset.is_success() {
            ResetStatus::Failed
        } else if self.maintenance_on.is_success() && self.maintenance_off.is_success() {
            ResetStatus::Success
        } else {
            ResetStatus::Partial
        };
        self.status
    }

    /// Whether this device can be verified in phase 2
    pub fn has_reset_timestamp(&self) -> bool {
        self.reset_timestamp.is_some()
    }

    /// Failures joined as `step: reason; ...`
    pub fn error_message(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.step, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Step outcomes agree with the reset state machine
    pub fn is_consistent(&self) -> bool {
        let timestamp_matches = self.reset.is_success() == self.reset_timestamp.is_some();

        let gated_on_maintenance = self.maintenance_on.is_success()
            || (self.reset == StepOutcome::Skipped
                && self.maintenance_off == StepOutcome::Skipped);

        let status_matches = match self.status {
            ResetStatus::Success => {
                self.maintenance_on.is_success()
                    && self.reset.is_success()
                    && self.maintenance_off.is_success()
            }
            ResetStatus::Partial => {
                self.reset.is_success() && !self.maintenance_off.is_success()
            }
            ResetStatus::Failed => !self.reset.is_success(),
            ResetStatus::Cancelled => true,
        };

        timestamp_matches && gated_on_maintenance && status_matches
    }
}
