//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, then environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → server swaps the admission policy atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Secrets (bot token, chat id, API keys) come from the environment
//! - Missing alert credentials disable alerts instead of failing startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::{
    AlertConfig, CompletionConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, TimeoutConfig,
};
