//! # Request Context
//!
//! Per-request identity threaded through the handlers: the request id set by
//! `SetRequestIdLayer` and the caller's IP.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Request id and client address for logging and processor metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: String,
}

impl RequestContext {
    fn from_parts(parts: &Parts) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let client_ip = forwarded_ip(&parts.headers)
            .or(peer)
            .map(|ip| normalize_ip(&ip))
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            request_id,
            client_ip,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Strip the IPv6-mapped-IPv4 prefix (`::ffff:203.0.113.9` -> `203.0.113.9`)
pub fn normalize_ip(ip: &str) -> String {
    let ip = ip.trim();
    match ip.get(..IPV4_MAPPED_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => {
            ip[IPV4_MAPPED_PREFIX.len()..].to_string()
        }
        _ => ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_normalize_ip() {
        assert_eq!(normalize_ip("::ffff:203.0.113.9"), "203.0.113.9");
        assert_eq!(normalize_ip("::FFFF:10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_ip("203.0.113.9"), "203.0.113.9");
        assert_eq!(normalize_ip("2001:db8::1"), "2001:db8::1");
        assert_eq!(normalize_ip("::1"), "::1");
    }

    #[test]
    fn test_context_from_headers() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "req-123")
            .header("x-forwarded-for", "::ffff:198.51.100.4, 10.0.0.1")
            .body(())
            .unwrap();

        let ctx = RequestContext::from_parts(&parts(request));
        assert_eq!(ctx.request_id, "req-123");
        assert_eq!(ctx.client_ip, "198.51.100.4");
    }

    #[test]
    fn test_context_from_connect_info() {
        let mut request = Request::builder().body(()).unwrap();
        let addr: SocketAddr = "[::ffff:192.0.2.33]:51000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let ctx = RequestContext::from_parts(&parts(request));
        assert_eq!(ctx.client_ip, "192.0.2.33");
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }

    #[test]
    fn test_context_without_address() {
        let ctx = RequestContext::from_parts(&parts(Request::builder().body(()).unwrap()));
        assert_eq!(ctx.client_ip, "unknown");
    }
}
