//! Gateway to the DIGIL device-management backend
//!
//! Provides the [`Gateway`] trait consumed by the workflows and its HTTP
//! implementation.

pub mod error;
pub mod http;

pub use error::{Error, Result};
pub use http::{HttpGateway, HttpGatewayBuilder};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use digil_core::{RegisterName, Registers, TokenSession};
use digil_types::{CommandLog, DeviceId, MaintenanceMode};

/// Remote operations on a device
///
/// Every method fails with [`digil_core::Error::DeviceUnreachable`] when the
/// device did not answer, and with [`digil_core::Error::Api`] when the
/// backend refused the request. Only [`Gateway::authenticate`] (or an
/// implicit token refresh) fails with [`digil_core::Error::Auth`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Obtain and cache a bearer token
    async fn authenticate(&self) -> digil_core::Result<TokenSession>;
    
    /// Switch maintenance mode on or off (idempotent)
    async fn set_maintenance_mode(&self, device: &DeviceId, enabled: bool) -> digil_core::Result<()>;
    
    /// Write a named register (idempotent from the caller's perspective)
    async fn set_register_value(
        &self,
        device: &DeviceId,
        register: &str,
        value: &str,
    ) -> digil_core::Result<()>;
    
    /// Read registers with their data timestamps
    ///
    /// Registers absent from the device data are missing from the map.
    async fn read_registers(
        &self,
        device: &DeviceId,
        names: &[RegisterName],
    ) -> digil_core::Result<Registers>;
    
    /// Current maintenance mode from the device configuration
    async fn maintenance_status(&self, device: &DeviceId) -> digil_core::Result<Option<MaintenanceMode>>;

    /// Commands logged for the device between `since` and `until`
    async fn commands_log(
        &self,
        device: &DeviceId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> digil_core::Result<CommandLog>;
}
