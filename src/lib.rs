//! Per-IP abuse control and audit alerting for small HTTP APIs.

pub mod alerts;
pub mod completion;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::AbuseControl;
