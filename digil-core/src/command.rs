//! Commands understood by the DIGIL backend
//!
//! Every command is POSTed as JSON to the device command endpoint.
//! Parameter values are always wrapped in `{"values": [...]}`.

use std::fmt;

use serde_json::{Value, json};

use crate::constants::RESET_PERIPHERAL;

/// Device command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Toggle maintenance mode
    Maintenance { enabled: bool },

    /// Write a named register on a peripheral
    SetValue {
        peripheral: String,
        register: String,
        value: String,
    },
}

impl Command {
    pub fn maintenance(enabled: bool) -> Self {
        Self::Maintenance { enabled }
    }

    /// `set_value` on the default peripheral
    pub fn set_value(register: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetValue {
            peripheral: RESET_PERIPHERAL.to_string(),
            register: register.into(),
            value: value.into(),
        }
    }

    /// Backend command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Maintenance { .. } => "maintenance",
            Self::SetValue { .. } => "set_value",
        }
    }

    /// JSON body for the command endpoint
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Maintenance { enabled } => json!({
                "name": self.name(),
                "params": {
                    "status": { "values": [if *enabled { "ON" } else { "OFF" }] }
                }
            }),
            Self::SetValue {
                peripheral,
                register,
                value,
            } => json!({
                "name": self.name(),
                "params": {
                    "peripheral": { "values": [peripheral] },
                    "param": { "values": [register] },
                    "value": { "values": [value] }
                }
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maintenance { enabled: true } => write!(f, "maintenance ON"),
            Self::Maintenance { enabled: false } => write!(f, "maintenance OFF"),
            Self::SetValue {
                register, value, ..
            } => write!(f, "set_value {}={}", register, value),
        }
    }
}
