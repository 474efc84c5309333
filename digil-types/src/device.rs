//! Device identity and role

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// DIGIL device identifier (`<site>_<unit>`, e.g. `1121621_0436`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse and validate an identifier
    ///
    /// Surrounding whitespace is trimmed. Both halves must be non-empty
    /// and alphanumeric, separated by a single underscore.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();

        if id.is_empty() {
            return Err(Error::Validation("empty device id".into()));
        }

        let mut parts = id.split('_');
        let (site, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(site), Some(unit), None) => (site, unit),
            _ => {
                return Err(Error::Validation(format!(
                    "device id '{}' is not in <site>_<unit> form",
                    id
                )));
            }
        };

        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(site) || !valid(unit) {
            return Err(Error::Validation(format!(
                "device id '{}' contains invalid characters",
                id
            )));
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Network role of a device
///
/// Slaves sleep between radio windows and need a longer retry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Master,
    Slave,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "slave" => Ok(Self::Slave),
            other => Err(Error::Parse(format!("unknown device role: '{}'", other))),
        }
    }
}

/// Lifecycle of a device inside a phase run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Loaded, waiting for a worker
    Queued,

    /// A workflow instance owns the device
    Running,

    /// Terminal result produced
    Finished,
}

/// A device loaded from the input list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub role: DeviceRole,
    status: DeviceStatus,
}

impl DeviceRecord {
    pub fn new(id: DeviceId, role: DeviceRole) -> Self {
        Self {
            id,
            role,
            status: DeviceStatus::Queued,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Hand the record to a workflow instance
    pub fn start(&mut self) -> Result<()> {
        if self.status != DeviceStatus::Queued {
            return Err(Error::Validation(format!(
                "device {} cannot start from {:?}",
                self.id, self.status
            )));
        }
        self.status = DeviceStatus::Running;
        Ok(())
    }

    /// Mark the record terminal; later calls are no-ops
    pub fn finish(&mut self) {
        self.status = DeviceStatus::Finished;
    }
}
