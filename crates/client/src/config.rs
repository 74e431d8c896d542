//! Client configuration.
//!
//! Values come from the environment (optionally seeded from a `.env` file by the
//! binary). Unset or unparseable variables fall back to the defaults below.

use std::time::Duration;

use url::Url;

use crate::error::ClientError;
use crate::infrastructure::websocket::AckPolicy;

pub const DEFAULT_ADDRESS: &str = "ws://localhost:14525";
pub const DEFAULT_MAX_PENDING: usize = 30;
/// Server-side timeout carried by every long-poll request.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_POLL_STALL_GRACE_MS: u64 = 2_000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket address of the game server.
    pub address: String,
    /// Upper bound on commands waiting for a correlated result.
    pub max_pending: usize,
    pub poll_timeout: Duration,
    /// How long past `poll_timeout` to wait before re-issuing a poll.
    pub poll_stall_grace: Duration,
    /// Interval between full game state requests made by the refresher.
    pub refresh_interval: Duration,
    pub ack_policy: AckPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            max_pending: DEFAULT_MAX_PENDING,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            poll_stall_grace: Duration::from_millis(DEFAULT_POLL_STALL_GRACE_MS),
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            ack_policy: AckPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Build the configuration from `YRWATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            address: lookup("YRWATCH_ADDRESS").unwrap_or(defaults.address),
            max_pending: lookup("YRWATCH_MAX_PENDING")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_pending),
            poll_timeout: millis("YRWATCH_POLL_TIMEOUT_MS", defaults.poll_timeout),
            poll_stall_grace: millis("YRWATCH_POLL_STALL_GRACE_MS", defaults.poll_stall_grace),
            refresh_interval: millis("YRWATCH_REFRESH_INTERVAL_MS", defaults.refresh_interval),
            ack_policy: lookup("YRWATCH_ACK_POLICY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ack_policy),
        }
    }

    /// Parse the address, accepting only `ws` and `wss` URLs.
    pub fn url(&self) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidAddress {
            address: self.address.clone(),
            reason,
        };
        let url = Url::parse(&self.address).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{}'", other))),
        }
    }
}
