//! Phase 2: read the inclinometer registers once and check them
//!
//! No retries beyond the gateway's own; a failed read yields an empty
//! result with `all_ok = false`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use digil_core::{Checks, Registers, Tolerance, VerifyRegisters};
use digil_transport::Gateway;
use digil_types::{VerifyResult, VerifyStatus, VerifyTarget};

use crate::orchestrator::{Abort, Workflow};

/// Phase 2 workflow
pub struct VerifyWorkflow {
    gateway: Arc<dyn Gateway>,
    tolerance: Tolerance,
    registers: VerifyRegisters,
}

impl VerifyWorkflow {
    pub fn new(gateway: Arc<dyn Gateway>, tolerance: Tolerance) -> Self {
        Self {
            gateway,
            tolerance,
            registers: VerifyRegisters::default(),
        }
    }

    /// Build the result from the registers the device returned
    pub fn evaluate(&self, target: &VerifyTarget, registers: &Registers) -> VerifyResult {
        let alarm = registers.get(&self.registers.alarm);
        let inc_x = registers.get(&self.registers.inc_x);
        let inc_y = registers.get(&self.registers.inc_y);

        let alarm_incl = alarm.and_then(|r| r.value.as_bool());
        let inc_x_avg = inc_x.and_then(|r| r.value.as_f64());
        let inc_y_avg = inc_y.and_then(|r| r.value.as_f64());

        // Newest sample among the registers proves the device reported after the reset
        let data_timestamp = [alarm, inc_x, inc_y]
            .into_iter()
            .flatten()
            .filter_map(|r| r.timestamp)
            .max();

        let checks = Checks::evaluate(
            alarm_incl,
            inc_x_avg,
            inc_y_avg,
            data_timestamp,
            target.reset_timestamp,
            self.tolerance,
        );

        let mut result = VerifyResult::empty(target, VerifyStatus::ReadFailed);
        result.data_timestamp = data_timestamp;
        result.alarm_incl = alarm_incl;
        result.inc_x_avg = inc_x_avg;
        result.inc_y_avg = inc_y_avg;
        result.alarm_ok = checks.alarm_ok;
        result.inc_x_ok = checks.inc_x_ok;
        result.inc_y_ok = checks.inc_y_ok;
        result.timestamp_valid = checks.timestamp_valid;
        result.all_ok = checks.all_ok();
        // Out-of-range pairs leave the delta empty
        result.timestamp_delta_ms =
            data_timestamp.and_then(|ts| ts.checked_sub(target.reset_timestamp));
        result.classify();
        result
    }
}

#[async_trait]
impl Workflow for VerifyWorkflow {
    type Input = VerifyTarget;
    type Output = VerifyResult;

    async fn run(
        &self,
        target: VerifyTarget,
        cancel: &CancellationToken,
    ) -> Result<VerifyResult, Abort<VerifyResult>> {
        if cancel.is_cancelled() {
            return Ok(VerifyResult::cancelled(&target));
        }

        let names = self.registers.names();
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(VerifyResult::cancelled(&target)),
            read = self.gateway.read_registers(&target.device_id, &names) => read,
        };

        let registers = match read {
            Ok(registers) => registers,
            Err(error) if error.is_fatal() => {
                return Err(Abort {
                    output: VerifyResult::read_failed(&target, error.to_string()),
                    error,
                });
            }
            Err(error) => {
                warn!(device = %target.device_id, "Read failed: {}", error);
                return Ok(VerifyResult::read_failed(&target, error.to_string()));
            }
        };

        debug!(device = %target.device_id, "{} registers read", registers.len());

        let result = self.evaluate(&target, &registers);
        if result.all_ok {
            info!(
                device = %target.device_id,
                delta = %result.timestamp_delta_readable(),
                "Verified"
            );
        } else {
            warn!(device = %target.device_id, "{}: {}", result.status, result.error_message);
        }

        Ok(result)
    }
}
