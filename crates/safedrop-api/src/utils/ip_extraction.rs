//! Client address extraction
//!
//! The rate limiter is keyed by the caller's address. Behind proxies that
//! address comes from `X-Forwarded-For`, trusting only the configured number of
//! hops closest to the server.

use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

const UNKNOWN: &str = "unknown";

/// Extract the client IP from request headers or the socket address.
///
/// Forwarding headers are only honored when `trusted_proxy_count > 0`; a
/// directly connected client can write anything there. Returns `"unknown"`
/// when nothing usable is available.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if trusted_proxy_count > 0 {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| from_forwarded_for(v, trusted_proxy_count));
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    socket_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Pick the address just before the trusted proxy hops.
///
/// A chain shorter than the trust depth yields its first hop.
fn from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let index = hops.len().saturating_sub(trusted_proxy_count + 1);
    hops.get(index)?.parse().ok()
}

/// Caller address for rate limiting and audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            state.config.trusted_proxy_count(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn forwarded(value: &str, trusted: usize) -> Option<String> {
        from_forwarded_for(value, trusted).map(|ip| ip.to_string())
    }

    #[test]
    fn test_forwarded_for_trust_depth() {
        assert_eq!(forwarded("192.168.1.1", 1).as_deref(), Some("192.168.1.1"));
        assert_eq!(
            forwarded("192.168.1.1, 10.0.0.1", 1).as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(
            forwarded("6.6.6.6, 192.168.1.1, 10.0.0.1, 10.0.0.2", 2).as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(forwarded("192.168.1.1", 3).as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_forwarded_for_garbage() {
        assert_eq!(forwarded("not.an.ip.address", 1), None);
        assert_eq!(forwarded("", 1), None);
        assert_eq!(forwarded(" , ", 1), None);
    }

    #[test]
    fn test_extract_client_ip_sources() {
        let xff = headers("x-forwarded-for", "203.0.113.9");
        assert_eq!(extract_client_ip(&xff, None, 1), "203.0.113.9");

        let real_ip = headers("x-real-ip", " 2001:db8::1 ");
        assert_eq!(extract_client_ip(&real_ip, None, 1), "2001:db8::1");

        let bad_xff = headers("x-forwarded-for", "bogus");
        let socket = SocketAddr::from(([127, 0, 0, 1], 8080));
        assert_eq!(extract_client_ip(&bad_xff, Some(&socket), 1), "127.0.0.1");

        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 1), "unknown");
    }

    #[test]
    fn test_headers_ignored_without_trusted_proxies() {
        let socket = SocketAddr::from(([198, 51, 100, 7], 52000));

        let xff = headers("x-forwarded-for", "203.0.113.9");
        assert_eq!(extract_client_ip(&xff, Some(&socket), 0), "198.51.100.7");

        let real_ip = headers("x-real-ip", "203.0.113.10");
        assert_eq!(extract_client_ip(&real_ip, Some(&socket), 0), "198.51.100.7");

        assert_eq!(extract_client_ip(&xff, None, 0), "unknown");
    }
}
