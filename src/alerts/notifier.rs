//! Outbound alert delivery.
//!
//! # Responsibilities
//! - Define the [`Notifier`] seam the reporter delivers through
//! - Deliver messages to the Telegram Bot API (`sendMessage`)
//!
//! # Design Decisions
//! - The bot token is part of the request URL, so transport errors are
//!   stripped of their URL before they reach any log line
//! - A response is successful only when the API answers `"ok": true`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::AlertConfig;

/// Errors that can occur while delivering an alert.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Delivery is turned off or credentials are missing.
    #[error("alert delivery disabled")]
    Disabled,

    /// The configured API base does not form a valid URL.
    #[error("invalid notifier endpoint: {0}")]
    InvalidEndpoint(String),

    /// Network or HTTP client failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// No answer within the delivery timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The API answered but refused the message.
    #[error("rejected by API: {0}")]
    Rejected(String),

    /// The API answered with something that is not a Bot API response.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A channel that can carry a rendered alert to humans.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: Url,
    chat_id: String,
}

impl TelegramNotifier {
    /// Build a notifier from configuration.
    ///
    /// Fails with [`NotifyError::Disabled`] when delivery is off or either
    /// credential is missing.
    pub fn from_config(config: &AlertConfig) -> Result<Self, NotifyError> {
        if !config.is_deliverable() {
            return Err(NotifyError::Disabled);
        }
        let (Some(token), Some(chat_id)) = (&config.bot_token, &config.chat_id) else {
            return Err(NotifyError::Disabled);
        };

        let endpoint = format!("{}/bot{}/sendMessage", config.api_base.trim_end_matches('/'), token);
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| NotifyError::InvalidEndpoint(format!("{}: {}", config.api_base, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            chat_id: chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(reqwest::Error::without_url)?;
        let parsed: BotResponse = serde_json::from_slice(&bytes)
            .map_err(|e| NotifyError::Malformed(format!("status {status}: {e}")))?;

        if parsed.ok {
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                parsed
                    .description
                    .unwrap_or_else(|| format!("status {status}")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_disabled() {
        let config = AlertConfig::default();
        assert!(matches!(
            TelegramNotifier::from_config(&config),
            Err(NotifyError::Disabled)
        ));

        let config = AlertConfig {
            bot_token: Some("123:abc".into()),
            chat_id: Some(String::new()),
            ..AlertConfig::default()
        };
        assert!(matches!(
            TelegramNotifier::from_config(&config),
            Err(NotifyError::Disabled)
        ));
    }

    #[test]
    fn test_endpoint_includes_token() {
        let config = AlertConfig {
            api_base: "http://127.0.0.1:9/".into(),
            bot_token: Some("123:abc".into()),
            chat_id: Some("42".into()),
            ..AlertConfig::default()
        };
        let notifier = TelegramNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.endpoint.as_str(), "http://127.0.0.1:9/bot123:abc/sendMessage");
        assert_eq!(notifier.chat_id, "42");
    }

    #[test]
    fn test_disabled_flag_wins_over_credentials() {
        let config = AlertConfig {
            enabled: false,
            bot_token: Some("123:abc".into()),
            chat_id: Some("42".into()),
            ..AlertConfig::default()
        };
        assert!(matches!(
            TelegramNotifier::from_config(&config),
            Err(NotifyError::Disabled)
        ));
    }
}
