//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deadline::DEFAULT_HEADER;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Deadline resolution settings.
    pub deadline: DeadlineConfig,

    /// In-memory consumer settings.
    pub consumer: ConsumerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Where inbound deadlines come from and what budget applies without one.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Message attribute carrying the absolute deadline.
    pub header: String,

    /// Budget in seconds for messages that carry no usable deadline.
    /// Absent (or zero) means such messages run without a deadline.
    #[serde(alias = "default_timeout")]
    pub default_timeout_secs: Option<f64>,
}

impl DeadlineConfig {
    /// Default budget as a `Duration`. Zero, negative and non-finite values yield `None`.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            default_timeout_secs: None,
        }
    }
}

/// Consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Capacity of the inbound message queue (backpressure).
    pub queue_capacity: usize,

    /// Maximum messages processed concurrently.
    pub max_in_flight: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 64,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter; `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.deadline.header, "x-deadline");
        assert_eq!(config.deadline.default_timeout_secs, None);
        assert_eq!(config.deadline.default_timeout(), None);
        assert_eq!(config.consumer.max_in_flight, 64);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_default_timeout_conversion() {
        let mut config = DeadlineConfig::default();

        config.default_timeout_secs = Some(2.5);
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(2500)));

        config.default_timeout_secs = Some(0.0);
        assert_eq!(config.default_timeout(), None);

        config.default_timeout_secs = Some(f64::NAN);
        assert_eq!(config.default_timeout(), None);
    }
}
