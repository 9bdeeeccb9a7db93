//! SmartRent connection configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::SmartRentError;

/// Endpoints and timings for the SmartRent API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmartRentConfig {
    /// Base URL of the REST API.
    pub api_url: String,
    /// Phoenix websocket endpoint.
    pub websocket_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Interval between websocket heartbeats, in seconds.
    pub heartbeat_secs: u64,
    /// Pause before reconnecting a dropped websocket, in seconds.
    pub reconnect_delay_secs: u64,
}

impl Default for SmartRentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://control.smartrent.com".to_string(),
            websocket_url: "wss://control.smartrent.com/socket/websocket".to_string(),
            request_timeout_secs: 10,
            heartbeat_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

impl SmartRentConfig {
    /// The REST base URL, parsed.
    ///
    /// # Errors
    ///
    /// Returns [`SmartRentError::Url`] if `api_url` is not a valid URL.
    pub fn api_base(&self) -> Result<Url, SmartRentError> {
        Ok(Url::parse(&self.api_url)?)
    }

    /// The websocket URL carrying `token` and the protocol version.
    ///
    /// # Errors
    ///
    /// Returns [`SmartRentError::Url`] if `websocket_url` is not a valid URL.
    pub fn socket_url(&self, token: &str) -> Result<Url, SmartRentError> {
        let mut url = Url::parse(&self.websocket_url)?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("vsn", crate::phoenix::VERSION);
        Ok(url)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
