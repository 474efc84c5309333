//! # digil
//!
//! Inclinometer reset and verification for fleets of DIGIL field devices.
//!
//! ## Features
//!
//! - Phase 1: maintenance ON, inclinometer reset, maintenance OFF per device
//! - Phase 2: alarm, inclination and data freshness checks after the reset
//! - Maintenance-mode and command queue checks
//! - Bounded worker pool with role-aware retry windows
//! - Cooperative cancellation on Ctrl-C
//! - CSV input and result export
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use digil::{
//!     CancellationToken, Credentials, DeviceRole, HttpGateway, Orchestrator, ResetWorkflow,
//!     RetryPolicies, TracingObserver, load_devices,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::new("https://auth.example/token", "client", "secret");
//!     let gateway = Arc::new(HttpGateway::builder("https://api.example", credentials).build()?);
//!
//!     let list = load_devices("devices.csv".as_ref(), DeviceRole::Slave)?;
//!     let workflow = ResetWorkflow::new(gateway, RetryPolicies::default());
//!
//!     let report = Orchestrator::new(5, CancellationToken::new())
//!         .run_phase(list.devices, Arc::new(workflow), &TracingObserver::new("reset"))
//!         .await;
//!
//!     for result in &report.results {
//!         println!("{} {}", result.device_id, result.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod input;
pub mod observer;
pub mod orchestrator;
pub mod queue;
pub mod reset;
pub mod retry;
pub mod status;
pub mod summary;
pub mod verify;

// Re-exports
pub use config::{Overrides, Settings};
pub use error::{Error, Result};
pub use export::{CsvRow, export_rows, export_summary};
pub use input::{DeviceList, VerifyTargets, load_devices, load_verify_targets, targets_from_results};
pub use observer::{NoopObserver, PhaseObserver, TracingObserver};
pub use orchestrator::{Abort, Orchestrator, PhaseInput, PhaseOutput, PhaseReport, Workflow};
pub use queue::QueueWorkflow;
pub use reset::{ResetState, ResetWorkflow};
pub use retry::{RetryError, with_retry};
pub use status::StatusWorkflow;
pub use summary::PhaseSummary;
pub use verify::VerifyWorkflow;

pub use tokio_util::sync::CancellationToken;

// Re-export lower layers
pub use digil_core::{Credentials, RetryPolicies, RetryPolicy, Tolerance};
pub use digil_transport::{Gateway, HttpGateway};
pub use digil_types::{
    CommandLog, DeviceId, DeviceRecord, DeviceRole, MaintenanceCheck, MaintenanceMode, QueueCheck,
    ResetResult, ResetStatus, VerifyResult, VerifyStatus, VerifyTarget,
};
