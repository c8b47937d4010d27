//! Client address extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::state::AppState;

/// Placeholder used when no address is known.
const UNKNOWN: &str = "unknown";

/// The client's IP address as text.
///
/// Taken from the first `X-Forwarded-For` hop when the server is configured
/// to trust it, otherwise from the socket peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.server.trust_forwarded_for {
            if let Some(ip) = forwarded_for(&parts.headers) {
                return Ok(Self(ip));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| UNKNOWN.to_string(), |ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(peer))
    }
}

/// The first address in `X-Forwarded-For`, if any.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_forwarded_for_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_for(&headers), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , "));
        assert_eq!(forwarded_for(&headers), None);
    }
}
