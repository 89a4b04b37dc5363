//! Configuration validation.
//!
//! Semantic checks only; serde already handled the syntax. Every problem is
//! collected so a bad config reports all of its errors at once.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("{field} is not a valid URL: {value}")]
    BadUrl { field: &'static str, value: String },

    #[error("rate_limit.retention_secs ({retention_ms} ms) must cover the spam window and cooldown ({required_ms} ms)")]
    RetentionTooShort { retention_ms: u64, required_ms: u64 },

    #[error("environment variable {var} has an invalid value: {value}")]
    BadEnv { var: &'static str, value: String },
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let rl = &config.rate_limit;
    let positive: [(&'static str, u64); 6] = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("rate_limit.window_ms", rl.window_ms),
        ("rate_limit.max_requests_per_window", rl.max_requests_per_window as u64),
        ("rate_limit.retention_secs", rl.retention_secs),
        ("rate_limit.sweep_interval_secs", rl.sweep_interval_secs),
        ("alerts.timeout_ms", config.alerts.timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    // A record swept while it still holds window entries would reset the
    // client's spam count.
    let retention_ms = rl.retention_secs.saturating_mul(1_000);
    let required_ms = rl.window_ms.max(rl.cooldown_ms);
    if rl.retention_secs > 0 && retention_ms < required_ms {
        errors.push(ValidationError::RetentionTooShort { retention_ms, required_ms });
    }
    if config.alerts.queue_capacity == 0 {
        errors.push(ValidationError::Zero { field: "alerts.queue_capacity" });
    }
    if config.completion.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "completion.timeout_secs" });
    }

    for (field, value) in [
        ("alerts.api_base", &config.alerts.api_base),
        ("completion.base_url", &config.completion.base_url),
    ] {
        if url::Url::parse(value).is_err() {
            errors.push(ValidationError::BadUrl { field, value: value.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.window_ms = 0;
        config.alerts.api_base = "::nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero { field: "rate_limit.window_ms" }));
    }

    #[test]
    fn test_retention_must_cover_window_and_cooldown() {
        let mut config = GatewayConfig::default();
        config.rate_limit.retention_secs = 10;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::RetentionTooShort { retention_ms: 10_000, required_ms: 60_000 }]
        );

        config.rate_limit.retention_secs = 60;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.window_ms = 1_000;
        config.rate_limit.cooldown_ms = 90_000;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::RetentionTooShort { retention_ms: 60_000, required_ms: 90_000 }]
        );
    }

    #[test]
    fn test_zero_cooldown_is_allowed() {
        let mut config = GatewayConfig::default();
        config.rate_limit.cooldown_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
