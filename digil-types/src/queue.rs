//! Command queue checks

use crate::device::DeviceId;

/// Pending commands kept per device in the export
pub const PENDING_SLOTS: usize = 5;

/// Sent commands kept per device in the export, newest first
pub const SENT_SLOTS: usize = 10;

/// Commands logged by the backend for a device over a time window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLog {
    /// Queued commands the device has not picked up yet
    pub pending: Vec<String>,

    /// Commands delivered to the device
    pub sent: Vec<String>,
}

/// Result of a command queue check for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCheck {
    pub device_id: DeviceId,
    pub log: CommandLog,
    pub error: String,
}

impl QueueCheck {
    pub fn new(device_id: DeviceId, log: CommandLog) -> Self {
        Self {
            device_id,
            log,
            error: String::new(),
        }
    }

    pub fn failed(device_id: DeviceId, error: impl Into<String>) -> Self {
        Self {
            device_id,
            log: CommandLog::default(),
            error: error.into(),
        }
    }

    /// `ERROR` on failure, `PENDING` while commands wait in the queue, else `EMPTY`
    pub fn status_label(&self) -> String {
        let label = if !self.error.is_empty() {
            "ERROR"
        } else if self.log.pending.is_empty() {
            "EMPTY"
        } else {
            "PENDING"
        };
        label.to_string()
    }
}
