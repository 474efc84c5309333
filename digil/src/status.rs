//! Maintenance-mode status check
//!
//! Reads the maintenance flag from each device's configuration, through
//! the same worker pool as the reset phases.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use digil_transport::Gateway;
use digil_types::{DeviceRecord, MaintenanceCheck};

use crate::orchestrator::{Abort, Workflow};

pub struct StatusWorkflow {
    gateway: Arc<dyn Gateway>,
}

impl StatusWorkflow {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Workflow for StatusWorkflow {
    type Input = DeviceRecord;
    type Output = MaintenanceCheck;

    async fn run(
        &self,
        record: DeviceRecord,
        cancel: &CancellationToken,
    ) -> Result<MaintenanceCheck, Abort<MaintenanceCheck>> {
        let device = record.id;
        let finish = |mode, error: String| MaintenanceCheck {
            device_id: device.clone(),
            mode,
            error,
        };

        if cancel.is_cancelled() {
            return Ok(finish(None, "cancelled".into()));
        }

        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(finish(None, "cancelled".into())),
            read = self.gateway.maintenance_status(&device) => read,
        };

        match read {
            Ok(mode) => {
                debug!(device = %device, "maintenance {:?}", mode);
                Ok(finish(mode, String::new()))
            }
            Err(error) if error.is_fatal() => Err(Abort {
                output: finish(None, error.to_string()),
                error,
            }),
            Err(error) => {
                warn!(device = %device, "Status read failed: {}", error);
                Ok(finish(None, error.to_string()))
            }
        }
    }
}
