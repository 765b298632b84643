//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::framing::Framing;
use crate::protocol::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_MIN_SERVER_VERSION, DELIVERY_TIMEOUT, REDIRECT_COUNT_MAX,
};

/// Connection and dispatch settings for one [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Gateway host name or address.
    pub host: String,
    /// Gateway TCP port.
    pub port: u16,
    /// Client id announced after the handshake.
    pub client_id: i32,
    /// Wire framing used for the whole session.
    pub framing: Framing,
    /// Reject servers reporting a lower protocol version.
    pub min_server_version: i32,
    /// Appended to the V100+ version range string.
    pub connect_options: Option<String>,
    /// Sent with START_API when the server supports it.
    pub optional_capabilities: String,
    /// Redirects followed before `connect` gives up.
    pub max_redirects: u32,
    /// Per-sink delivery budget in milliseconds.
    pub delivery_timeout_ms: u64,
    /// Capacity of the engine's internal channels.
    pub channel_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4002,
            client_id: 0,
            framing: Framing::V100,
            min_server_version: DEFAULT_MIN_SERVER_VERSION,
            connect_options: None,
            optional_capabilities: String::new(),
            max_redirects: REDIRECT_COUNT_MAX,
            delivery_timeout_ms: DELIVERY_TIMEOUT.as_millis() as u64,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_min_server_version(mut self, version: i32) -> Self {
        self.min_server_version = version;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Channel capacity, never zero.
    pub(crate) fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}
