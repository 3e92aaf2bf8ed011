//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges of the broker options
//! - Validate addresses before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::ops::RangeInclusive;

use crate::config::schema::{BrokerConfig, ProxyConfig};

/// A single rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending option, e.g. `message_broker.request_retry_count`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate the whole configuration tree.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    validate_broker(&config.message_broker, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_broker(broker: &BrokerConfig, errors: &mut Vec<ValidationError>) {
    if broker.directory_path.trim().is_empty() {
        errors.push(ValidationError::new("message_broker.directory_path", "must not be empty"));
    }

    check_range(errors, "message_broker.request_retry_count", broker.request_retry_count as u64, 0..=20);
    check_range(errors, "message_broker.request_retry_delay_ms", broker.request_retry_delay_ms, 0..=40_000);
    check_range(errors, "message_broker.concurrent_request_count", broker.concurrent_request_count as u64, 1..=256);
    check_range(errors, "message_broker.response_cache_count", broker.response_cache_count as u64, 1..=256);
    check_range(errors, "message_broker.file_time_to_live_minutes", broker.file_time_to_live_minutes, 1..=500);
}

fn check_range(errors: &mut Vec<ValidationError>, field: &str, value: u64, range: RangeInclusive<u64>) {
    if !range.contains(&value) {
        errors.push(ValidationError::new(
            field,
            format!("{} is outside {}..={}", value, range.start(), range.end()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.message_broker.directory_path = "./broker".into();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_default_config_requires_directory() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "message_broker.directory_path");
    }

    #[test]
    fn test_reports_every_out_of_range_option() {
        let mut config = valid_config();
        config.message_broker.request_retry_count = 21;
        config.message_broker.request_retry_delay_ms = 40_001;
        config.message_broker.concurrent_request_count = 0;
        config.message_broker.response_cache_count = 257;
        config.message_broker.file_time_to_live_minutes = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "message_broker.request_retry_count",
                "message_broker.request_retry_delay_ms",
                "message_broker.concurrent_request_count",
                "message_broker.response_cache_count",
                "message_broker.file_time_to_live_minutes",
            ]
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut config = valid_config();
        config.message_broker.request_retry_count = 20;
        config.message_broker.request_retry_delay_ms = 0;
        config.message_broker.concurrent_request_count = 256;
        config.message_broker.response_cache_count = 1;
        config.message_broker.file_time_to_live_minutes = 500;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let mut config = valid_config();
        config.listener.bind_address = "not-an-address".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("not-an-address"));
    }
}
