//! Service status endpoint (unguarded).

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::alerts::message::format_timestamp;
use crate::http::handlers::timestamp;
use crate::http::server::AppState;

pub const ENDPOINT: &str = "/api/status";

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Send a test alert and wait for its outcome.
    #[serde(default)]
    pub probe: bool,
}

#[derive(Debug, Serialize)]
pub struct SecurityStatus {
    pub rate_limit_enabled: bool,
    pub cooldown_ms: u64,
    pub max_requests_per_window: usize,
    pub window_ms: u64,
    pub telegram_reporting: bool,
    /// `ok`, `failed`, `skipped` or `disabled`.
    pub telegram_test: &'static str,
    pub tracked_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub security: SecurityStatus,
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let reporter = &state.reporter;
    let telegram_test = if !reporter.is_enabled() {
        "disabled"
    } else if query.probe {
        let text = format!(
            "<b>🔄 API Test Report</b>\n\n<b>🔧 Endpoint:</b> {}\n<b>⏰ Time:</b> {}\n<b>✅ Status:</b> Test message",
            ENDPOINT,
            format_timestamp(reporter.local_now())
        );
        match reporter.send_now(&text).await {
            Ok(()) => "ok",
            Err(_) => "failed",
        }
    } else {
        "skipped"
    };

    let policy = state.gate.policy();
    Json(StatusResponse {
        success: true,
        message: "API is online",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: timestamp(),
        security: SecurityStatus {
            rate_limit_enabled: policy.enabled,
            cooldown_ms: policy.cooldown_ms,
            max_requests_per_window: policy.max_requests_per_window,
            window_ms: policy.window_ms,
            telegram_reporting: reporter.is_enabled(),
            telegram_test,
            tracked_clients: state.gate.tracked_clients(),
        },
    })
}
