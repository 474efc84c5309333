//! Runtime settings
//!
//! Settings come from an optional TOML file; CLI flags and environment
//! variables override individual fields.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use digil_core::constants::{
    DEFAULT_BASE_URL, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_MASTER_WINDOW_MINS,
    DEFAULT_READ_TIMEOUT_SECS, DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SLAVE_WINDOW_MINS,
    DEFAULT_TOLERANCE, DEFAULT_WORKERS,
};
use digil_core::{Credentials, RetryPolicies, RetryPolicy, Tolerance};

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,

    /// Concurrent device workers
    pub workers: usize,

    pub retry_interval_secs: u64,
    pub master_window_mins: u64,
    pub slave_window_mins: u64,

    /// Max |avg| on each inclination axis
    pub tolerance: f64,

    pub command_timeout_secs: u64,
    pub read_timeout_secs: u64,

    /// The backend serves an internal certificate
    pub accept_invalid_certs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            workers: DEFAULT_WORKERS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            master_window_mins: DEFAULT_MASTER_WINDOW_MINS,
            slave_window_mins: DEFAULT_SLAVE_WINDOW_MINS,
            tolerance: DEFAULT_TOLERANCE,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            accept_invalid_certs: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("workers", &self.workers)
            .field("retry_interval_secs", &self.retry_interval_secs)
            .field("master_window_mins", &self.master_window_mins)
            .field("slave_window_mins", &self.slave_window_mins)
            .field("tolerance", &self.tolerance)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub auth_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub workers: Option<usize>,
    pub retry_interval_secs: Option<u64>,
    pub master_window_mins: Option<u64>,
    pub slave_window_mins: Option<u64>,
    pub tolerance: Option<f64>,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from `path`, or start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml_str(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.base_url {
            self.base_url = v;
        }
        if let Some(v) = overrides.auth_url {
            self.auth_url = v;
        }
        if let Some(v) = overrides.client_id {
            self.client_id = v;
        }
        if let Some(v) = overrides.client_secret {
            self.client_secret = v;
        }
        if let Some(v) = overrides.workers {
            self.workers = v;
        }
        if let Some(v) = overrides.retry_interval_secs {
            self.retry_interval_secs = v;
        }
        if let Some(v) = overrides.master_window_mins {
            self.master_window_mins = v;
        }
        if let Some(v) = overrides.slave_window_mins {
            self.slave_window_mins = v;
        }
        if let Some(v) = overrides.tolerance {
            self.tolerance = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.credentials().validate()?;

        if self.base_url.trim().is_empty() {
            return Err(Error::Config("BASE_URL is not set".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }
        self.retry_policies()?;
        self.tolerance()?;

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.auth_url, &self.client_id, &self.client_secret)
    }

    pub fn retry_policies(&self) -> Result<RetryPolicies> {
        let interval = Duration::from_secs(self.retry_interval_secs);
        Ok(RetryPolicies {
            master: RetryPolicy::new(window("master", self.master_window_mins)?, interval)?,
            slave: RetryPolicy::new(window("slave", self.slave_window_mins)?, interval)?,
        })
    }

    pub fn tolerance(&self) -> Result<Tolerance> {
        Ok(Tolerance::new(self.tolerance)?)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn window(role: &str, minutes: u64) -> Result<Duration> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("{} retry window of {} minutes is too large", role, minutes)))
}
