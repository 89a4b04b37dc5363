//! Chat completion proxy (guarded).
//!
//! Accepts `prompt` (system prompt) and `text` (user message) either as
//! query parameters on GET or as a JSON body on POST, validates them and
//! forwards them to the completion upstream.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::alerts::{ReportStatus, RequestMeta};
use crate::completion::CompletionError;
use crate::http::handlers::{json_error, timestamp};
use crate::http::server::AppState;
use crate::observability::metrics;

pub const ENDPOINT: &str = "/api/ai/chat";

const NO_PARAMS: [(&str, &str); 0] = [];

#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub model: String,
    pub result: String,
    pub timestamp: String,
}

pub async fn chat(
    State(state): State<AppState>,
    meta: RequestMeta,
    method: Method,
    Query(query): Query<ChatParams>,
    body: Bytes,
) -> Response {
    let response = handle(&state, &meta, method, query, &body).await;
    metrics::record_request(ENDPOINT, response.status().as_u16());
    response
}

async fn handle(
    state: &AppState,
    meta: &RequestMeta,
    method: Method,
    query: ChatParams,
    body: &[u8],
) -> Response {
    let reporter = &state.reporter;

    let params = match method {
        Method::OPTIONS => return StatusCode::OK.into_response(),
        Method::GET => query,
        Method::POST if body.is_empty() => ChatParams::default(),
        Method::POST => match serde_json::from_slice::<ChatParams>(body) {
            Ok(params) => params,
            Err(e) => {
                reporter.report(ENDPOINT, meta, NO_PARAMS, ReportStatus::Error, Some(&e.to_string()));
                return json_error(StatusCode::BAD_REQUEST, "Request body must be a JSON object");
            }
        },
        _ => {
            reporter.report(ENDPOINT, meta, NO_PARAMS, ReportStatus::Error, Some("Method not allowed"));
            return json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed. Use GET or POST.");
        }
    };

    let prompt = params.prompt.as_deref().map(str::trim).unwrap_or_default();
    let text = params.text.as_deref().map(str::trim).unwrap_or_default();

    let missing: Vec<&str> = [("prompt", prompt), ("text", text)]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        let missing = missing.join(", ");
        reporter.report(
            ENDPOINT,
            meta,
            [("missing", missing.as_str())],
            ReportStatus::Error,
            Some("Missing required parameters"),
        );
        return json_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required parameters: {missing}"),
        );
    }

    let limits = &state.completion_limits;
    for (name, value, max) in [
        ("prompt", prompt, limits.max_prompt_chars),
        ("text", text, limits.max_text_chars),
    ] {
        if value.chars().count() > max {
            let error = format!("{name} too long (max {max} characters)");
            reporter.report(ENDPOINT, meta, NO_PARAMS, ReportStatus::Error, Some(&error));
            return json_error(StatusCode::BAD_REQUEST, error);
        }
    }

    if !state.completion.is_configured() {
        reporter.report(
            ENDPOINT,
            meta,
            NO_PARAMS,
            ReportStatus::Error,
            Some("Completion upstream not configured"),
        );
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "Completion service unavailable");
    }

    let model = state.completion.model();
    // Only sizes are reported; user text never goes to the alert chat.
    let sizes = [
        ("prompt_length", prompt.chars().count().to_string()),
        ("text_length", text.chars().count().to_string()),
        ("model", model.to_string()),
    ];
    reporter.report(ENDPOINT, meta, sizes.clone(), ReportStatus::Processing, None);

    let started = Instant::now();
    let outcome = state.completion.complete(prompt, text).await;
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        Ok(completion) => {
            let tokens = completion
                .total_tokens
                .map_or_else(|| "n/a".to_string(), |t| t.to_string());
            reporter.report(
                ENDPOINT,
                meta,
                [
                    ("response_length", completion.content.chars().count().to_string()),
                    ("total_tokens", tokens),
                    ("response_time", format!("{elapsed_ms}ms")),
                ],
                ReportStatus::Success,
                None,
            );
            Json(ChatResponse {
                success: true,
                model: model.to_string(),
                result: completion.content,
                timestamp: timestamp(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(client = %meta.client_id, error = %e, "Completion request failed");
            reporter.report(ENDPOINT, meta, sizes, ReportStatus::Error, Some(&e.to_string()));
            let status = match e {
                CompletionError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            json_error(status, "Completion request failed")
        }
    }
}
