//! Role-aware retry policies
//!
//! A policy bounds how long a single step keeps retrying an unreachable
//! device. Slaves sleep between radio windows, so their window is longer.

use std::time::Duration;

use digil_types::DeviceRole;

use crate::constants::{
    DEFAULT_MASTER_WINDOW_MINS, DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SLAVE_WINDOW_MINS,
};
use crate::error::{Error, Result};

/// Retry window and poll interval for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wall-clock budget measured from the first attempt
    pub window: Duration,

    /// Pause between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(window: Duration, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Config("retry interval must be positive".into()));
        }
        Ok(Self { window, interval })
    }

    /// How long to wait before the next attempt, `None` once exhausted
    ///
    /// The last wait is shortened so the final check lands exactly on
    /// the end of the window.
    pub fn next_wait(&self, elapsed: Duration) -> Option<Duration> {
        let remaining = self.window.checked_sub(elapsed)?;
        if remaining.is_zero() {
            return None;
        }
        Some(remaining.min(self.interval))
    }
}

/// One policy per device role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    pub master: RetryPolicy,
    pub slave: RetryPolicy,
}

impl RetryPolicies {
    pub fn for_role(&self, role: DeviceRole) -> RetryPolicy {
        match role {
            DeviceRole::Master => self.master,
            DeviceRole::Slave => self.slave,
        }
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let interval = Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS);
        Self {
            master: RetryPolicy {
                window: Duration::from_secs(DEFAULT_MASTER_WINDOW_MINS * 60),
                interval,
            },
            slave: RetryPolicy {
                window: Duration::from_secs(DEFAULT_SLAVE_WINDOW_MINS * 60),
                interval,
            },
        }
    }
}
