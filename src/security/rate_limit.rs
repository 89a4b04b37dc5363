//! Admission middleware for guarded routes.

use std::sync::Arc;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::alerts::RequestMeta;
use crate::security::abuse::{AbuseControl, Decision, Denial};

/// JSON body of a 429 answer.
#[derive(Debug, Serialize)]
pub struct RateLimitBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
    pub reason: &'static str,
    pub retry_after: u64,
    pub timestamp: String,
}

/// A denied admission, rendered as `429 Too Many Requests`.
#[derive(Debug)]
pub struct RateLimitRejection {
    denial: Denial,
}

impl RateLimitRejection {
    pub fn new(denial: Denial) -> Self {
        Self { denial }
    }

    pub fn body(&self) -> RateLimitBody {
        RateLimitBody {
            success: false,
            error: "Rate limit exceeded",
            message: self.denial.message(),
            reason: self.denial.reason.as_str(),
            retry_after: self.denial.retry_after_secs(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let retry_after = HeaderValue::from(self.denial.retry_after_secs());
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self.body())).into_response();
        response.headers_mut().insert(header::RETRY_AFTER, retry_after);
        response
    }
}

/// Middleware function gating every request through [`AbuseControl`].
///
/// CORS preflight requests pass untouched.
pub async fn rate_limit_middleware(
    State(gate): State<Arc<AbuseControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let meta = RequestMeta::from_request(&request);
    match gate.admit(&meta) {
        Decision::Allowed => next.run(request).await,
        Decision::Denied(denial) => RateLimitRejection::new(denial).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::security::abuse::DenyReason;

    #[test]
    fn test_rejection_body() {
        let rejection = RateLimitRejection::new(Denial {
            reason: DenyReason::Cooldown,
            retry_after: Duration::from_millis(2_500),
            window_count: 1,
            window: Duration::from_secs(60),
        });
        let body = rejection.body();
        assert!(!body.success);
        assert_eq!(body.error, "Rate limit exceeded");
        assert_eq!(body.reason, "rate_limit");
        assert_eq!(body.retry_after, 3);
        assert_eq!(body.message, "Please wait 3 seconds");
        assert!(chrono::DateTime::parse_from_rfc3339(&body.timestamp).is_ok());

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }
}
