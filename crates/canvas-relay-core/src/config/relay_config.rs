use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;
use crate::error::{RelayError, Result};

/// Relay configuration
///
/// Built from CLI flags / environment by the binary; every field has a
/// sensible default so tests can start from `RelayConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Port the relay server listens on (localhost only)
    pub port: u16,

    /// Timeout applied to every forwarded host call (milliseconds)
    pub request_timeout_ms: u64,

    /// Ring buffer capacity for host events
    pub event_capacity: usize,

    /// Reserved channel label the registry is seeded with
    pub default_channel: String,

    /// Server name announced in handshakes
    pub server_name: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            request_timeout_ms: defaults::DEFAULT_REQUEST_TIMEOUT_MS,
            event_capacity: defaults::DEFAULT_EVENT_CAPACITY,
            default_channel: defaults::DEFAULT_CHANNEL.to_string(),
            server_name: defaults::DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl RelayConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_default_channel(mut self, label: impl Into<String>) -> Self {
        self.default_channel = label.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(RelayError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(RelayError::Config(
                "event capacity must be at least 1".to_string(),
            ));
        }
        if self.default_channel.trim().is_empty() {
            return Err(RelayError::Config(
                "default channel label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8765);
        assert_eq!(config.request_timeout_ms, 15_000);
        assert_eq!(config.event_capacity, 200);
        assert_eq!(config.default_channel, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RelayConfig::new()
            .with_port(9000)
            .with_request_timeout_ms(250)
            .with_event_capacity(5);
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.event_capacity, 5);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = RelayConfig::new().with_event_capacity(0);
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: RelayConfig = serde_json::from_str(r#"{"port": 4000}"#).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.event_capacity, 200);
    }
}
