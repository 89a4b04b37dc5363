//! Configuration loading from disk and the environment.

use std::path::Path;
use std::fs;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without environment overrides or validation.
fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    finish(read_file(path)?)
}

/// Load configuration from an optional file, falling back to defaults,
/// then layer the process environment on top.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(GatewayConfig::default()),
    }
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    let mut errors = apply_env_overrides(&mut config, |k| std::env::var(k).ok());
    if let Err(more) = validate_config(&config) {
        errors.extend(more);
    }
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Returns one error per variable that is set but cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("GATE_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    parse_into(&lookup, "GATE_RATE_LIMIT_ENABLED", &mut config.rate_limit.enabled, &mut errors);
    parse_into(&lookup, "GATE_COOLDOWN_MS", &mut config.rate_limit.cooldown_ms, &mut errors);
    parse_into(
        &lookup,
        "GATE_MAX_REQUESTS_PER_WINDOW",
        &mut config.rate_limit.max_requests_per_window,
        &mut errors,
    );
    parse_into(&lookup, "GATE_WINDOW_MS", &mut config.rate_limit.window_ms, &mut errors);
    parse_into(&lookup, "GATE_RETENTION_SECS", &mut config.rate_limit.retention_secs, &mut errors);
    parse_into(
        &lookup,
        "GATE_SWEEP_INTERVAL_SECS",
        &mut config.rate_limit.sweep_interval_secs,
        &mut errors,
    );
    parse_into(&lookup, "GATE_ALERTS_ENABLED", &mut config.alerts.enabled, &mut errors);

    if let Some(v) = lookup("TELEGRAM_BOT_TOKEN") {
        config.alerts.bot_token = Some(v);
    }
    if let Some(v) = lookup("TELEGRAM_CHAT_ID") {
        config.alerts.chat_id = Some(v);
    }
    if let Some(v) = lookup("GATE_COMPLETION_API_KEY") {
        config.completion.api_key = Some(v);
    }
    if let Some(v) = lookup("GATE_LOG_LEVEL") {
        config.observability.log_level = v;
    }

    errors
}

fn parse_into<T, F>(lookup: &F, var: &'static str, slot: &mut T, errors: &mut Vec<ValidationError>)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else { return };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => errors.push(ValidationError::BadEnv { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_overrides_rate_limit() {
        let mut config = GatewayConfig::default();
        let errors = apply_env_overrides(
            &mut config,
            env(&[
                ("GATE_COOLDOWN_MS", "1500"),
                ("GATE_MAX_REQUESTS_PER_WINDOW", "4"),
                ("GATE_RATE_LIMIT_ENABLED", "false"),
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_CHAT_ID", "42"),
            ]),
        );

        assert!(errors.is_empty());
        assert_eq!(config.rate_limit.cooldown_ms, 1500);
        assert_eq!(config.rate_limit.max_requests_per_window, 4);
        assert!(!config.rate_limit.enabled);
        assert!(config.alerts.is_deliverable());
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let mut config = GatewayConfig::default();
        let errors = apply_env_overrides(&mut config, env(&[("GATE_WINDOW_MS", "soon")]));

        assert_eq!(
            errors,
            vec![ValidationError::BadEnv { var: "GATE_WINDOW_MS", value: "soon".into() }]
        );
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn test_missing_credentials_disable_delivery() {
        let config = GatewayConfig::default();
        assert!(config.alerts.enabled);
        assert!(!config.alerts.is_deliverable());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rate_limit]\ncooldown_ms = 1000\n\n[listener]\nbind_address = \"127.0.0.1:9000\""
        )
        .unwrap();

        let config = read_file(file.path()).unwrap();
        assert_eq!(config.rate_limit.cooldown_ms, 1000);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unparseable_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit\ncooldown_ms = ").unwrap();
        assert!(matches!(read_file(file.path()), Err(ConfigError::Parse(_))));
    }
}
