//! Endpoint handlers.
//!
//! Guarded handlers run behind the admission middleware and report their own
//! progress through [`AuditReporter`](crate::alerts::AuditReporter).

pub mod chat;
pub mod status;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// ISO-8601 timestamp used in every JSON body.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Uniform `{ success: false, error, timestamp }` answer.
pub fn json_error(status: StatusCode, error: impl Into<String>) -> Response {
    let body = json!({
        "success": false,
        "error": error.into(),
        "timestamp": timestamp(),
    });
    (status, Json(body)).into_response()
}
