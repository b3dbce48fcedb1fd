//! Client identity derivation from request origin.
//!
//! # Responsibilities
//! - Resolve the rate-limit key for a request
//! - Prefer the first X-Forwarded-For entry, then X-Real-IP, then the peer
//!
//! # Design Decisions
//! - Forwarded headers are only honored when the deployment says a trusted
//!   proxy sits in front of the gateway
//! - The identity is never persisted beyond the limiter window

use axum::http::HeaderMap;
use std::fmt;
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Rate-limit key derived from where a request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive the identity for a request.
    pub fn from_request(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trust_forwarded: bool,
    ) -> Self {
        if trust_forwarded {
            let forwarded = header_str(headers, X_FORWARDED_FOR)
                .and_then(|chain| chain.split(',').next())
                .map(str::trim)
                .filter(|first| !first.is_empty());
            if let Some(first) = forwarded {
                return Self::new(first);
            }

            if let Some(real_ip) = header_str(headers, X_REAL_IP)
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                return Self::new(real_ip);
            }
        }

        match peer {
            Some(addr) => Self::new(addr.ip().to_string()),
            None => Self::new("unknown"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.2"));

        let id = ClientIdentity::from_request(&headers, peer(), true);
        assert_eq!(id.as_str(), "203.0.113.9");
    }

    #[test]
    fn test_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("  "));
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            ClientIdentity::from_request(&headers, peer(), true).as_str(),
            "198.51.100.2"
        );

        let headers = HeaderMap::new();
        assert_eq!(
            ClientIdentity::from_request(&headers, peer(), true).as_str(),
            "10.0.0.7"
        );
        assert_eq!(
            ClientIdentity::from_request(&headers, None, true).as_str(),
            "unknown"
        );
    }

    #[test]
    fn test_untrusted_forwarded_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        let id = ClientIdentity::from_request(&headers, peer(), false);
        assert_eq!(id.as_str(), "10.0.0.7");
    }
}
