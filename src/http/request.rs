//! Request metadata extraction.
//!
//! # Responsibilities
//! - Derive the client identifier for admission and alerts
//! - Capture method, path and user agent for alert messages

use std::convert::Infallible;
use std::net::SocketAddr;
use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, Extensions, HeaderMap, Method, Request, Uri},
};

use crate::alerts::RequestMeta;
use crate::security::client_identifier;

impl RequestMeta {
    /// Build metadata from a full request (used by middleware).
    pub fn from_request(request: &Request<Body>) -> Self {
        build(request.method(), request.uri(), request.headers(), request.extensions())
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(build(&parts.method, &parts.uri, &parts.headers, &parts.extensions))
    }
}

fn build(method: &Method, uri: &Uri, headers: &HeaderMap, extensions: &Extensions) -> RequestMeta {
    let remote = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RequestMeta {
        method: method.to_string(),
        path: uri.path().to_string(),
        client_id: client_identifier(headers, remote),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string(),
    }
}
