//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit, CORS headers)
//!     → security::rate_limit (guarded routes only)
//!     → request.rs (request metadata for alerts)
//!     → handlers/ (status, chat completion proxy)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use server::{AppState, HttpServer, ServerError};
