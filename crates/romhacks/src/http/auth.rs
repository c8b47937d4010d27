//! Admin sessions.
//!
//! A session is a cookie holding `<expiry>.<mac>`, where `expiry` is a Unix
//! timestamp and `mac` is a keyed BLAKE3 hash of the admin name and the
//! expiry. Nothing is stored server side; changing the session secret or the
//! admin name invalidates every session.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{FromRequestParts, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::form::FormOrJson;
use super::state::AppState;
use crate::config::Config;
use crate::error::{Error, Result};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "romhacks_admin";

const SESSION_CONTEXT: &str = "romhacks 2024-01 admin session cookies";

/// Signs and checks session cookies.
pub struct SessionKey {
    key: [u8; 32],
}

impl SessionKey {
    /// Derive the signing key from configuration.
    ///
    /// Without a configured secret the key mixes in the process start time,
    /// so sessions end when the server restarts.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let material = match &config.admin.session_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                let started = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos();
                format!(
                    "{}:{started}",
                    config.admin.password.as_deref().unwrap_or_default()
                )
            }
        };
        Self::new(&material)
    }

    /// Derive a signing key from secret material.
    #[must_use]
    pub fn new(material: &str) -> Self {
        Self {
            key: blake3::derive_key(SESSION_CONTEXT, material.as_bytes()),
        }
    }

    fn mac(&self, username: &str, expiry: i64) -> blake3::Hash {
        blake3::keyed_hash(&self.key, format!("admin:{username}:{expiry}").as_bytes())
    }

    /// Create a cookie value valid until `now + ttl`.
    #[must_use]
    pub fn issue(&self, username: &str, now: DateTime<Utc>, ttl: Duration) -> String {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expiry = now.timestamp().saturating_add(ttl);
        format!("{expiry}.{}", self.mac(username, expiry).to_hex())
    }

    /// Check a cookie value.
    #[must_use]
    pub fn verify(&self, value: &str, username: &str, now: DateTime<Utc>) -> bool {
        let Some((expiry, mac)) = value.split_once('.') else {
            return false;
        };
        let Ok(expiry) = expiry.parse::<i64>() else {
            return false;
        };
        if expiry <= now.timestamp() {
            return false;
        }
        let Ok(mac) = blake3::Hash::from_hex(mac) else {
            return false;
        };
        // blake3::Hash equality is constant time
        self.mac(username, expiry) == mac
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

/// Proof that the request carries a valid admin session.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if !state.config.admin_enabled() {
            return Err(Error::AdminDisabled);
        }
        let username = state.config.admin.username.as_deref().unwrap_or_default();

        match session_cookie(&parts.headers) {
            Some(value) if state.sessions.verify(value, username, Utc::now()) => Ok(Self),
            _ => Err(Error::Unauthorized),
        }
    }
}

/// Find the session cookie in the request headers.
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

fn set_cookie_header(value: &str, max_age: u64, secure: bool) -> Result<HeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| Error::internal(format!("bad cookie header: {e}")))
}

/// Login credentials.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<LoginRequest>,
) -> Result<Response> {
    let admin = &state.config.admin;
    let (Some(username), Some(password)) = (admin.username.as_deref(), admin.password.as_deref())
    else {
        return Err(Error::AdminDisabled);
    };

    let name_ok = blake3::hash(request.username.as_bytes()) == blake3::hash(username.as_bytes());
    let password_ok =
        blake3::hash(request.password.as_bytes()) == blake3::hash(password.as_bytes());
    if !(name_ok && password_ok) {
        warn!("Failed admin login attempt");
        return Err(Error::Unauthorized);
    }

    let ttl = state.config.session_ttl();
    let value = state.sessions.issue(username, Utc::now(), ttl);
    let header = set_cookie_header(&value, ttl.as_secs(), admin.secure_cookie)?;

    info!("Admin logged in");
    let mut response = Json(json!({ "success": true })).into_response();
    response.headers_mut().insert(SET_COOKIE, header);
    Ok(response)
}

/// `POST /admin/logout`
pub async fn logout(State(state): State<AppState>) -> Result<Response> {
    let header = set_cookie_header("", 0, state.config.admin.secure_cookie)?;
    let mut response = Json(json!({ "success": true })).into_response();
    response.headers_mut().insert(SET_COOKIE, header);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let key = SessionKey::new("secret");
        let cookie = key.issue("admin", now(), Duration::from_secs(3600));

        assert!(key.verify(&cookie, "admin", now()));
        assert!(!key.verify(&cookie, "someone-else", now()));
        assert!(!key.verify(&cookie, "admin", now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_other_key_rejects() {
        let cookie = SessionKey::new("one").issue("admin", now(), Duration::from_secs(60));
        assert!(!SessionKey::new("two").verify(&cookie, "admin", now()));
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let key = SessionKey::new("secret");
        let cookie = key.issue("admin", now(), Duration::from_secs(60));
        let (expiry, mac) = cookie.split_once('.').unwrap();
        let later: i64 = expiry.parse::<i64>().unwrap() + 3600;

        assert!(!key.verify(&format!("{later}.{mac}"), "admin", now()));
        assert!(!key.verify("garbage", "admin", now()));
        assert!(!key.verify("123.nothex", "admin", now()));
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; romhacks_admin=123.abc; other=1"),
        );
        assert_eq!(session_cookie(&headers), Some("123.abc"));

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn test_configured_secret_is_stable() {
        let mut config = Config::default();
        config.admin.session_secret = Some("stable".to_string());

        let cookie = SessionKey::from_config(&config).issue("admin", now(), Duration::from_secs(60));
        assert!(SessionKey::from_config(&config).verify(&cookie, "admin", now()));
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", SessionKey::new("secret"));
        assert!(!debug.contains("key:"));
    }
}
