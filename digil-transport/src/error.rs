//! Transport errors

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Longest response body kept in an error message
const MAX_BODY_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    
    #[error("Request timeout")]
    Timeout,
    
    #[error("Connection failed: {0}")]
    Connect(String),
    
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    
    #[error("Decode error: {0}")]
    Decode(String),
    
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Sort a reqwest failure into timeout / connection / decode buckets
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() || err.is_request() {
            Self::Connect(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err)
        }
    }
    
    pub fn status(status: StatusCode, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_BODY_LEN) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status {
            status: status.as_u16(),
            body,
        }
    }
    
    /// Whether the device may answer a later attempt
    ///
    /// Timeouts, connection failures, 408, 429 and any 5xx are treated as
    /// the device (or its radio link) being unavailable.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..=599).contains(status)
            }
            Self::Http(_) | Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<Error> for digil_core::Error {
    fn from(err: Error) -> Self {
        if err.is_unreachable() {
            return digil_core::Error::DeviceUnreachable(err.to_string());
        }
        let status = match &err {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        };
        digil_core::Error::api(status, err.to_string())
    }
}
