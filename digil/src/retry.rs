//! Retry loop for unreachable devices
//!
//! Only [`digil_core::Error::DeviceUnreachable`] is retried. The window
//! is measured from the first attempt; cancellation is honoured before
//! every attempt and while waiting between attempts.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use digil_core::RetryPolicy;
use digil_types::{DeviceId, Step};

/// Why a retried operation stopped without succeeding
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Device stayed unreachable for the whole window
    #[error("gave up after {attempts} attempts in {}s: {last}", .elapsed.as_secs())]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: digil_core::Error,
    },

    /// Terminal error for this device
    #[error("{0}")]
    Rejected(digil_core::Error),

    #[error("cancelled")]
    Cancelled,

    /// Run-wide failure (authentication)
    #[error("{0}")]
    Fatal(digil_core::Error),
}

/// Run `op` until it succeeds, fails terminally or the window closes
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    device: &DeviceId,
    step: Step,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = digil_core::Result<T>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        attempts += 1;
        let err = match op().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(device = %device, step = %step, attempts, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.is_fatal() {
            return Err(RetryError::Fatal(err));
        }
        if !err.is_recoverable() {
            return Err(RetryError::Rejected(err));
        }

        let elapsed = start.elapsed();
        let Some(wait) = policy.next_wait(elapsed) else {
            return Err(RetryError::Exhausted {
                attempts,
                elapsed,
                last: err,
            });
        };

        warn!(
            device = %device,
            step = %step,
            attempt = attempts,
            "{}; retrying in {}s",
            err,
            wait.as_secs()
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep(wait) => {}
        }
    }
}
