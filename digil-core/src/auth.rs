//! OAuth2 client credentials
//!
//! The backend issues bearer tokens through a standard
//! `client_credentials` grant posted as a form.

use std::fmt;

use crate::constants::SECRET_PLACEHOLDER;
use crate::error::{Error, Result};

/// Credentials handed to the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reject empty fields and the sample placeholder secret
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.trim().is_empty() {
            return Err(Error::Config("AUTH_URL is not set".into()));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("CLIENT_ID is not set".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Config("CLIENT_SECRET is not set".into()));
        }
        if self.client_secret == SECRET_PLACEHOLDER {
            return Err(Error::Config(
                "CLIENT_SECRET still contains the placeholder".into(),
            ));
        }
        Ok(())
    }

    /// Form fields for the token request
    pub fn form(&self) -> [(&'static str, &str); 3] {
        [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
