//! Type definitions for the DIGIL reset tooling

pub mod device;
pub mod error;
pub mod maintenance;
pub mod queue;
pub mod reset;
pub mod time;
pub mod verify;

pub use device::{DeviceId, DeviceRecord, DeviceRole, DeviceStatus};
pub use error::{Error, Result};
pub use maintenance::{MaintenanceCheck, MaintenanceMode};
pub use queue::{CommandLog, PENDING_SLOTS, QueueCheck, SENT_SLOTS};
pub use reset::{ResetResult, ResetStatus, Step, StepFailure, StepOutcome};
pub use verify::{VerifyResult, VerifyStatus, VerifyTarget};
