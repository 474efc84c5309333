//! Post-reset verification checks
//!
//! After a reset the alarm must be cleared, both inclination averages
//! must sit within the tolerance of zero, and the data must have been
//! produced after the reset was acknowledged.

use crate::constants::DEFAULT_TOLERANCE;
use crate::error::{Error, Result};

/// Maximum accepted |avg| on an inclination axis (inclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    pub fn new(limit: f64) -> Result<Self> {
        if !limit.is_finite() || limit < 0.0 {
            return Err(Error::Config(format!("invalid tolerance: {}", limit)));
        }
        Ok(Self(limit))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// `|avg| <= limit`; NaN never passes
    pub fn contains(&self, avg: f64) -> bool {
        avg.abs() <= self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

/// Data is fresh only if strictly newer than the reset
pub fn is_fresh(data_timestamp: i64, reset_timestamp: i64) -> bool {
    data_timestamp > reset_timestamp
}

/// The four verification checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checks {
    pub alarm_ok: bool,
    pub inc_x_ok: bool,
    pub inc_y_ok: bool,
    pub timestamp_valid: bool,
}

impl Checks {
    /// Compute every check; a missing reading fails its own check only
    pub fn evaluate(
        alarm: Option<bool>,
        inc_x: Option<f64>,
        inc_y: Option<f64>,
        data_timestamp: Option<i64>,
        reset_timestamp: i64,
        tolerance: Tolerance,
    ) -> Self {
        Self {
            alarm_ok: alarm == Some(false),
            inc_x_ok: inc_x.is_some_and(|v| tolerance.contains(v)),
            inc_y_ok: inc_y.is_some_and(|v| tolerance.contains(v)),
            timestamp_valid: data_timestamp.is_some_and(|ts| is_fresh(ts, reset_timestamp)),
        }
    }

    pub fn all_ok(&self) -> bool {
        self.alarm_ok && self.inc_x_ok && self.inc_y_ok && self.timestamp_valid
    }
}
