//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the broker proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request handling mode.
    pub application: ApplicationConfig,

    /// File message broker settings.
    pub message_broker: BrokerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a caller waits for a correlated response, in seconds.
    /// When it elapses the request is reported as aborted.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// Request handling mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Collapse concurrent identical requests into one broker round trip.
    pub use_advanced_mode: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            use_advanced_mode: true,
        }
    }
}

/// File message broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker root directory. Required; there is no usable default.
    pub directory_path: String,

    /// Additional attempts after the first, for writes and reads (0-20).
    pub request_retry_count: u32,

    /// Fixed delay between retry attempts in milliseconds (0-40000).
    pub request_retry_delay_ms: u64,

    /// Outbound write concurrency limit (1-256).
    pub concurrent_request_count: usize,

    /// Capacity of the bounded delivery queue (1-256).
    pub response_cache_count: usize,

    /// Maximum artifact age before forced deletion, in minutes (1-500).
    pub file_time_to_live_minutes: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            directory_path: String::new(),
            request_retry_count: 5,
            request_retry_delay_ms: 25,
            concurrent_request_count: 128,
            response_cache_count: 128,
            file_time_to_live_minutes: 5,
        }
    }
}

impl BrokerConfig {
    /// Default settings rooted at `directory`.
    pub fn with_directory(directory: impl Into<String>) -> Self {
        Self {
            directory_path: directory.into(),
            ..Self::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.request_retry_delay_ms)
    }

    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.file_time_to_live_minutes * 60)
    }

    /// The sweep runs twice per time-to-live.
    pub fn sweep_period(&self) -> Duration {
        self.time_to_live() / 2
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
