//! Error taxonomy shared by the gateway and the workflows

/// Result type alias for DIGIL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by gateway calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Token endpoint rejected the credentials or could not be reached
    #[error("Authentication failed: {0}")]
    Auth(String),
    
    /// Device (or its radio link) did not answer; worth retrying
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),
    
    /// Backend refused or failed the request
    #[error("API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },
    
    /// Register name could not be parsed
    #[error("Invalid register name: {0}")]
    InvalidRegister(String),
    
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    
    #[error(transparent)]
    Types(#[from] digil_types::Error),
}

impl Error {
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
    
    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeviceUnreachable(_))
    }
    
    /// Check if error must halt the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
