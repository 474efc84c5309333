//! Register names and readings
//!
//! The device document returned by the backend groups registers in two
//! sections, `diags` and `measures`. Each entry carries its own data
//! `timestamp` next to one or more value fields (`value`, `avg`, ...).
//! A [`RegisterName`] selects an entry and, after a dot, a field:
//! `SENS_Digil2_Inc_X.avg`. Without a field, `value` is read.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde_json::Value;
use tracing::trace;

use crate::constants::{ALARM_REGISTER, INC_X_REGISTER, INC_Y_REGISTER};
use crate::error::{Error, Result};

/// Sections of the device document searched, in order
const SECTIONS: [&str; 2] = ["diags", "measures"];

/// Field read when the name carries none
const DEFAULT_FIELD: &str = "value";

/// Register name with optional field selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterName {
    base: String,
    field: Option<String>,
}

impl RegisterName {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (base, field) = match raw.split_once('.') {
            Some((base, field)) => (base, Some(field)),
            None => (raw, None),
        };

        let valid = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };

        if !valid(base) || field.is_some_and(|f| !valid(f)) {
            return Err(Error::InvalidRegister(raw.to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            field: field.map(str::to_string),
        })
    }

    /// Entry name inside `diags`/`measures`
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Field read from the entry
    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(DEFAULT_FIELD)
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}", self.base, field),
            None => f.write_str(&self.base),
        }
    }
}

impl FromStr for RegisterName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Registers read by the verification workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRegisters {
    pub alarm: RegisterName,
    pub inc_x: RegisterName,
    pub inc_y: RegisterName,
}

impl VerifyRegisters {
    pub fn names(&self) -> Vec<RegisterName> {
        vec![self.alarm.clone(), self.inc_x.clone(), self.inc_y.clone()]
    }
}

impl Default for VerifyRegisters {
    fn default() -> Self {
        let known = |raw: &str| {
            let (base, field) = match raw.split_once('.') {
                Some((base, field)) => (base, Some(field.to_string())),
                None => (raw, None),
            };
            RegisterName {
                base: base.to_string(),
                field,
            }
        };

        Self {
            alarm: known(ALARM_REGISTER),
            inc_x: known(INC_X_REGISTER),
            inc_y: known(INC_Y_REGISTER),
        }
    }
}

/// Register value as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RegisterValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A register value and the time the device produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterReading {
    pub value: RegisterValue,

    /// Epoch milliseconds
    pub timestamp: Option<i64>,
}

/// Readings keyed by register name
pub type Registers = HashMap<RegisterName, RegisterReading>;

/// Look a register up in a device document
pub fn extract(document: &Value, name: &RegisterName) -> Option<RegisterReading> {
    let entry = SECTIONS
        .iter()
        .find_map(|section| document.get(section)?.get(name.base()))?;

    let value = entry.get(name.field()).and_then(RegisterValue::from_json)?;
    let timestamp = entry.get("timestamp").and_then(timestamp_ms);

    Some(RegisterReading { value, timestamp })
}

/// Extract every requested register present in the document
pub fn extract_all(document: &Value, names: &[RegisterName]) -> Registers {
    names
        .iter()
        .filter_map(|name| match extract(document, name) {
            Some(reading) => Some((name.clone(), reading)),
            None => {
                trace!("register {} not present in device data", name);
                None
            }
        })
        .collect()
}

/// Epoch milliseconds from an integer, float, numeric string or RFC 3339 string
fn timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.timestamp_millis())
        }),
        _ => None,
    }
}
