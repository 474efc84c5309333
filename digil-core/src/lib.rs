//! # digil-core
//!
//! Domain rules for the DIGIL reset tooling, free of I/O:
//! - Error taxonomy (auth, unreachable, API)
//! - Command payloads understood by the backend and the commands log
//! - Register names and readings
//! - Token session state
//! - Role-aware retry policies
//! - Verification checks

pub mod auth;
pub mod checks;
pub mod clock;
pub mod command;
pub mod command_log;
pub mod constants;
pub mod error;
pub mod register;
pub mod retry;
pub mod session;

pub use auth::Credentials;
pub use checks::{Checks, Tolerance};
pub use clock::{Clock, SteppingClock, SystemClock};
pub use command::Command;
pub use error::{Error, Result};
pub use register::{RegisterName, RegisterReading, RegisterValue, Registers, VerifyRegisters};
pub use retry::{RetryPolicies, RetryPolicy};
pub use session::TokenSession;
