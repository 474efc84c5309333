//! Command queue check
//!
//! Lists the commands the backend logged for each device since a fixed
//! start time, to confirm that reset commands left the queue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use digil_transport::Gateway;
use digil_types::{DeviceRecord, QueueCheck};

use crate::orchestrator::{Abort, Workflow};

pub struct QueueWorkflow {
    gateway: Arc<dyn Gateway>,
    since: DateTime<Utc>,
}

impl QueueWorkflow {
    /// Check commands logged from `since` until each request is sent
    pub fn new(gateway: Arc<dyn Gateway>, since: DateTime<Utc>) -> Self {
        Self { gateway, since }
    }

    /// Look back `hours` from now
    pub fn hours_back(gateway: Arc<dyn Gateway>, hours: u32) -> Self {
        Self::new(gateway, Utc::now() - chrono::Duration::hours(i64::from(hours)))
    }
}

#[async_trait]
impl Workflow for QueueWorkflow {
    type Input = DeviceRecord;
    type Output = QueueCheck;

    async fn run(
        &self,
        record: DeviceRecord,
        cancel: &CancellationToken,
    ) -> Result<QueueCheck, Abort<QueueCheck>> {
        let device = record.id;

        if cancel.is_cancelled() {
            return Ok(QueueCheck::failed(device, "cancelled"));
        }

        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(QueueCheck::failed(device.clone(), "cancelled")),
            read = self.gateway.commands_log(&device, self.since, Utc::now()) => read,
        };

        match read {
            Ok(log) => {
                debug!(
                    device = %device,
                    "{} pending, {} sent",
                    log.pending.len(),
                    log.sent.len()
                );
                Ok(QueueCheck::new(device, log))
            }
            Err(error) if error.is_fatal() => Err(Abort {
                output: QueueCheck::failed(device, error.to_string()),
                error,
            }),
            Err(error) => {
                warn!(device = %device, "Commands log read failed: {}", error);
                Ok(QueueCheck::failed(device, error.to_string()))
            }
        }
    }
}
