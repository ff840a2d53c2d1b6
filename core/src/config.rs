//! Lifecycle configuration structures

use crate::error::ConfigError;
use crate::message::DEVICE_NAME_LEN;

/// Bus topics shared with the backend
///
/// These names are part of the wire contract and must not change without a
/// matching backend release.
pub mod topics {
    /// Measurement reports (device → backend)
    pub const MEASUREMENT: &str = "sensores/medicao";
    /// Start/stop commands (backend → device)
    pub const COMMAND: &str = "sensores/processo";
    /// Bind requests (device → backend)
    pub const BIND_REQUEST: &str = "sensores/bind/request";
    /// Bind responses (backend → device)
    pub const BIND_RESPONSE: &str = "sensores/bind/response";
    /// Identity release (device → backend)
    pub const UNBIND: &str = "sensores/bind/unbind";
    /// Plain-text lifecycle status (device → backend)
    pub const STATUS: &str = "sensores/status";
}

/// Lifecycle controller configuration
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// Client id presented to the bus on connect
    pub client_id: &'static str,
    /// Name sent in bind requests (at most 31 characters)
    pub device_name: &'static str,
    /// Sensor channel sampled for each report
    pub sensor_channel: u8,
    /// Channel wired to the battery gauge; `None` reports a state of charge of 0
    pub battery_channel: Option<u8>,
    /// Wait after a failed bus connect in milliseconds
    pub connect_backoff_ms: u32,
    /// How long one bind attempt waits for its response in milliseconds
    pub bind_timeout_ms: u32,
    /// Wait before retrying a timed-out bind in milliseconds
    pub bind_retry_backoff_ms: u32,
    /// Bus drain after each report so a late stop is seen, in milliseconds
    pub drain_window_ms: u32,
    /// Pause between bus polls inside bounded waits in milliseconds
    pub poll_interval_ms: u32,
    /// Deep sleep between measurement cycles in microseconds
    pub sleep_duration_us: u64,
    /// Pause between driver loop ticks in milliseconds
    pub tick_interval_ms: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            client_id: "ESP32Client",
            device_name: "esp32_1",
            sensor_channel: 34,
            battery_channel: None,
            connect_backoff_ms: 1000,
            bind_timeout_ms: 5000,
            bind_retry_backoff_ms: 2000,
            drain_window_ms: 500,
            poll_interval_ms: 10,
            sleep_duration_us: 10_000_000,
            tick_interval_ms: 10,
        }
    }
}

impl LifecycleConfig {
    /// Check constraints the controller relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.device_name.len() > DEVICE_NAME_LEN {
            return Err(ConfigError::DeviceNameTooLong);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.client_id, "ESP32Client");
        assert_eq!(config.device_name, "esp32_1");
        assert_eq!(config.bind_timeout_ms, 5000);
        assert_eq!(config.bind_retry_backoff_ms, 2000);
        assert_eq!(config.drain_window_ms, 500);
        assert_eq!(config.sleep_duration_us, 10_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LifecycleConfig {
            device_name: "a-device-name-that-is-far-too-long",
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::DeviceNameTooLong));

        let config = LifecycleConfig {
            client_id: "",
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyClientId));

        let config = LifecycleConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
    }

    #[test]
    fn test_topics_have_no_wildcards() {
        for topic in [
            topics::MEASUREMENT,
            topics::COMMAND,
            topics::BIND_REQUEST,
            topics::BIND_RESPONSE,
            topics::UNBIND,
            topics::STATUS,
        ] {
            assert!(!topic.contains('+') && !topic.contains('#'));
        }
    }
}
