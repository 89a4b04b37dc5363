//! Audit alert subsystem.
//!
//! # Data Flow
//! ```text
//! admission gate / endpoint handler
//!     → message.rs (Alert built from request metadata, rendered to HTML)
//!     → reporter.rs (bounded queue, never blocks the caller)
//!     → AlertWorker (one delivery at a time, timeout per delivery)
//!     → notifier.rs (Telegram Bot API sendMessage)
//! ```
//!
//! # Design Decisions
//! - Delivery failures are logged and counted, never returned to handlers
//! - Missing credentials turn the reporter into a no-op

pub mod message;
pub mod notifier;
pub mod reporter;

pub use message::{Alert, EventKind, ReportStatus, RequestMeta};
pub use notifier::{Notifier, NotifyError, TelegramNotifier};
pub use reporter::{AlertWorker, AuditReporter};
