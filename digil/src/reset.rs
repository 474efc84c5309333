//! Phase 1: maintenance ON, inclinometer reset, maintenance OFF
//!
//! ```text
//! Idle -> MaintOn -> Resetting -> MaintOff -> Done
//!            |           |  (failure still goes to MaintOff)
//!            +-> Done    |
//! ```
//!
//! Each step retries an unreachable device within the role's window.
//! The reset timestamp is taken the moment the reset write is
//! acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use digil_core::constants::{RESET_REGISTER, RESET_VALUE};
use digil_core::{Clock, RetryPolicies, RetryPolicy, SystemClock};
use digil_transport::Gateway;
use digil_types::{DeviceId, DeviceRecord, ResetResult, ResetStatus, Step, StepOutcome};

use crate::orchestrator::{Abort, Workflow};
use crate::retry::{RetryError, with_retry};

/// Reset state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Idle,
    MaintOn,
    Resetting,
    MaintOff,
    Done(ResetStatus),
}

/// Why the state machine stopped early
enum Interrupt {
    Cancelled,
    Fatal(digil_core::Error),
}

/// Phase 1 workflow
pub struct ResetWorkflow {
    gateway: Arc<dyn Gateway>,
    policies: RetryPolicies,
    clock: Arc<dyn Clock>,
}

impl ResetWorkflow {
    pub fn new(gateway: Arc<dyn Gateway>, policies: RetryPolicies) -> Self {
        Self {
            gateway,
            policies,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom source for reset timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn send(
        &self,
        step: Step,
        device: &DeviceId,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), RetryError> {
        let gateway = &self.gateway;
        match step {
            Step::MaintenanceOn => {
                with_retry(policy, cancel, device, step, || {
                    gateway.set_maintenance_mode(device, true)
                })
                .await
            }
            Step::Reset => {
                with_retry(policy, cancel, device, step, || {
                    gateway.set_register_value(device, RESET_REGISTER, RESET_VALUE)
                })
                .await
            }
            Step::MaintenanceOff => {
                with_retry(policy, cancel, device, step, || {
                    gateway.set_maintenance_mode(device, false)
                })
                .await
            }
        }
    }

    /// Run one step and record its outcome; `Ok(false)` means it failed
    async fn step(
        &self,
        result: &mut ResetResult,
        step: Step,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<bool, Interrupt> {
        let device = result.device_id.clone();

        match self.send(step, &device, policy, cancel).await {
            Ok(()) => {
                if step == Step::Reset {
                    result.record_reset(self.clock.now_millis());
                } else {
                    result.set_outcome(step, StepOutcome::Success);
                }
                debug!(device = %device, "{}: OK", step);
                Ok(true)
            }
            Err(RetryError::Cancelled) => Err(Interrupt::Cancelled),
            Err(RetryError::Fatal(err)) => {
                result.fail_step(step, err.to_string());
                Err(Interrupt::Fatal(err))
            }
            Err(err) => {
                warn!(device = %device, "{} failed: {}", step, err);
                result.fail_step(step, err.to_string());
                Ok(false)
            }
        }
    }

    async fn drive(
        &self,
        result: &mut ResetResult,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        let device = result.device_id.clone();
        let mut state = ResetState::Idle;

        let mut advance = |next: ResetState| -> Result<(), Interrupt> {
            if cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            debug!(device = %device, "{:?} -> {:?}", state, next);
            state = next;
            Ok(())
        };

        advance(ResetState::MaintOn)?;
        if !self.step(result, Step::MaintenanceOn, policy, cancel).await? {
            return Ok(());
        }

        advance(ResetState::Resetting)?;
        self.step(result, Step::Reset, policy, cancel).await?;

        // Cleanup runs whatever the reset outcome
        advance(ResetState::MaintOff)?;
        self.step(result, Step::MaintenanceOff, policy, cancel).await?;

        Ok(())
    }
}

#[async_trait]
impl Workflow for ResetWorkflow {
    type Input = DeviceRecord;
    type Output = ResetResult;

    async fn run(
        &self,
        mut record: DeviceRecord,
        cancel: &CancellationToken,
    ) -> Result<ResetResult, Abort<ResetResult>> {
        let policy = self.policies.for_role(record.role);
        let mut result = ResetResult::new(record.id.clone(), record.role);

        if let Err(e) = record.start() {
            result.fail_step(Step::MaintenanceOn, e.to_string());
            result.classify(false);
            return Ok(result);
        }

        let outcome = self.drive(&mut result, policy, cancel).await;
        record.finish();

        match outcome {
            Ok(()) => {
                let status = result.classify(false);
                debug!(device = %record.id, "{:?}", ResetState::Done(status));
                if status == ResetStatus::Success {
                    info!(device = %record.id, role = %record.role, "Reset completed");
                } else {
                    warn!(
                        device = %record.id,
                        role = %record.role,
                        "Reset {}: {}",
                        status,
                        result.error_message()
                    );
                }
                Ok(result)
            }
            Err(Interrupt::Cancelled) => {
                result.classify(true);
                warn!(device = %record.id, "Reset cancelled");
                Ok(result)
            }
            Err(Interrupt::Fatal(error)) => {
                result.classify(false);
                Err(Abort {
                    output: result,
                    error,
                })
            }
        }
    }
}
