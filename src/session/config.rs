//! Configuration for a DAB session

use crate::error::{DabError, Result};
use std::time::Duration;

/// Configuration for a session, immutable once the session is built
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client identity presented to the broker
    pub client_id: String,

    /// How long `connect` waits for the broker's acknowledgment
    pub connect_timeout: Duration,

    /// Timeout used by `request` when none is given
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// Create a new configuration with the given client identity
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(DabError::Configuration(format!(
                "invalid client id '{}'",
                self.client_id
            )));
        }

        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(DabError::Configuration("timeouts must be non-zero".into()));
        }

        Ok(())
    }
}
