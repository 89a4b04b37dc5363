//! Client identifier extraction.
//!
//! Priority: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
//! connection's remote address, else [`UNKNOWN_CLIENT`].

use std::net::SocketAddr;
use axum::http::HeaderMap;

/// Identifier used when a request carries no usable origin.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Derive the rate-limiting key for a request.
pub fn client_identifier(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn remote() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 1.2.3.4 , 5.6.7.8"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identifier(&headers, remote()), "1.2.3.4");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(""));
        headers.insert(X_REAL_IP, HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identifier(&headers, remote()), "9.9.9.9");
    }

    #[test]
    fn test_remote_address_fallback() {
        assert_eq!(client_identifier(&HeaderMap::new(), remote()), "10.0.0.7");
    }

    #[test]
    fn test_unknown_sentinel() {
        assert_eq!(client_identifier(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }
}
