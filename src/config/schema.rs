//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client abuse control.
    pub rate_limit: RateLimitConfig,

    /// Audit alert delivery.
    pub alerts: AlertConfig,

    /// Upstream completion API used by the chat endpoint.
    pub completion: CompletionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
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
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Abuse control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable admission checks. When false every request is allowed.
    pub enabled: bool,

    /// Minimum spacing between two allowed requests from one client.
    pub cooldown_ms: u64,

    /// Maximum allowed requests inside one spam window.
    pub max_requests_per_window: usize,

    /// Length of the trailing spam window.
    pub window_ms: u64,

    /// Records untouched for longer than this are evicted by the sweeper.
    pub retention_secs: u64,

    /// Interval between sweeper passes.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 3_000,
            max_requests_per_window: 15,
            window_ms: 60_000,
            retention_secs: 300,
            sweep_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Telegram alert delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Enable alert delivery. Forced off when credentials are missing.
    pub enabled: bool,

    /// Bot API base URL.
    pub api_base: String,

    /// Bot token. Supplied through `TELEGRAM_BOT_TOKEN` in production.
    pub bot_token: Option<String>,

    /// Destination chat. Supplied through `TELEGRAM_CHAT_ID` in production.
    pub chat_id: Option<String>,

    /// Per-delivery timeout in milliseconds.
    pub timeout_ms: u64,

    /// Number of alerts that may wait for delivery before new ones are dropped.
    pub queue_capacity: usize,

    /// Offset from UTC, in hours, used for timestamps inside alert messages.
    pub utc_offset_hours: i32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
            timeout_ms: 5_000,
            queue_capacity: 256,
            // Asia/Jakarta
            utc_offset_hours: 7,
        }
    }
}

impl AlertConfig {
    /// Whether alerts are enabled and both credentials are present.
    pub fn is_deliverable(&self) -> bool {
        self.enabled
            && self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Upstream chat completion API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Bearer key. The chat endpoint answers 503 while this is unset.
    pub api_key: Option<String>,

    /// Model name forwarded upstream.
    pub model: String,

    /// Upstream call timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum accepted system prompt length, in characters.
    pub max_prompt_chars: usize,

    /// Maximum accepted user text length, in characters.
    pub max_text_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "llama-3.1-8b-instant".to_string(),
            timeout_secs: 30,
            max_prompt_chars: 2_000,
            max_text_chars: 4_000,
        }
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

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Value sent in `Access-Control-Allow-Origin`.
    pub cors_allow_origin: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            cors_allow_origin: "*".to_string(),
        }
    }
}
