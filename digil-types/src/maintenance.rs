//! Maintenance-mode status checks

use std::fmt;

use crate::device::DeviceId;

/// Maintenance mode as reported by the device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceMode {
    On,
    Off,
    /// Value the backend reported that we do not recognise
    Other(String),
}

impl MaintenanceMode {
    pub fn from_reported(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ON" => Self::On,
            "OFF" => Self::Off,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl fmt::Display for MaintenanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
            Self::Other(v) => f.write_str(v),
        }
    }
}

/// Result of a maintenance status check for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceCheck {
    pub device_id: DeviceId,
    /// `None` when the status could not be read or was not reported
    pub mode: Option<MaintenanceMode>,
    pub error: String,
}

impl MaintenanceCheck {
    pub fn status_label(&self) -> String {
        match (&self.mode, self.error.is_empty()) {
            (Some(mode), _) => mode.to_string(),
            (None, true) => "UNKNOWN".to_string(),
            (None, false) => "ERROR".to_string(),
        }
    }
}
