//! Client for an OpenAI-compatible chat completion API.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CompletionConfig;

/// Errors returned by the completion upstream.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API key configured.
    #[error("completion API key not configured")]
    NotConfigured,

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("upstream response had no completion")]
    Empty,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    /// Reported by the upstream when it tracks usage.
    pub total_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Thin upstream client; one per process.
pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the upstream to answer `text` under the system `prompt`.
    pub async fn complete(&self, prompt: &str, text: &str) -> Result<Completion, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::NotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: prompt },
                ChatMessage { role: "user", content: text },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::Empty)?;

        Ok(Completion {
            content,
            total_tokens: parsed.usage.map(|u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = CompletionClient::new(&CompletionConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.complete("be brief", "hi").await,
            Err(CompletionError::NotConfigured)
        ));
    }

    #[test]
    fn test_usage_is_optional() {
        let with_usage: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hi"}}],"usage":{"prompt_tokens":3,"total_tokens":7}}"#,
        )
        .unwrap();
        assert_eq!(with_usage.usage.map(|u| u.total_tokens), Some(7));

        let without: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hi"}}]}"#).unwrap();
        assert!(without.usage.is_none());
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:1234/v1/".into(),
            api_key: Some("k".into()),
            ..CompletionConfig::default()
        };
        let client = CompletionClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://127.0.0.1:1234/v1/chat/completions");
        assert!(client.is_configured());
    }
}
