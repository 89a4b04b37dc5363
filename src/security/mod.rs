//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on a guarded route:
//!     → client_id.rs (derive the per-client key)
//!     → rate_limit.rs (middleware: ask the gate, render 429 on denial)
//!     → abuse.rs (cooldown + spam window bookkeeping, denial alerts)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - The gate is synchronous; it never waits on I/O
//! - Denials always get a structured JSON body, never a bare status
//! - Alert delivery can never change an admission decision

pub mod abuse;
pub mod client_id;
pub mod rate_limit;

pub use abuse::{AbuseControl, Decision, Denial, DenyReason};
pub use client_id::{client_identifier, UNKNOWN_CLIENT};
pub use rate_limit::{rate_limit_middleware, RateLimitRejection};
