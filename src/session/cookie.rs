//! Session cookie handling.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::SessionConfig;
use crate::session::SessionId;

/// Session id from the request's `Cookie` headers.
///
/// A missing or malformed value yields `None`; the caller starts a fresh
/// session in that case.
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| value.parse().ok())
}

/// `Set-Cookie` value binding the client to `id`.
pub fn set_cookie_value(config: &SessionConfig, id: &SessionId) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, id, config.max_age_secs
    );
    if config.secure {
        cookie.push_str("; Secure");
    }

    match HeaderValue::from_str(&cookie) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(cookie_name = %config.cookie_name, error = %e, "Invalid session cookie");
            None
        }
    }
}
