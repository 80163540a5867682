//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for connecting to an LED server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address as `host:port`. The client connects to `ws://<address>/ws`.
    pub address: String,

    /// Shared secret for the authentication handshake
    pub secret: Option<String>,

    /// How long to wait for the connection and handshake to complete
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// How long to wait for the reply to a single request
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            secret: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// WebSocket URL for the configured address
    pub fn url(&self) -> String {
        crate::traits::endpoint_url(&self.address)
    }
}
