//! Request inspection.
//!
//! # Responsibilities
//! - Rebuild the absolute URL the client asked for
//! - Extract the client address (forwarded-for chain or peer)
//!
//! # Design Decisions
//! - X-Forwarded-Proto only counts when it says http or https
//! - An unparseable request URL means "pass through", never an error

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
};
use std::net::SocketAddr;
use url::Url;

use crate::redirect::RequestContext;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Build the engine's view of `request`.
pub fn request_context(
    request: &Request<Body>,
    default_scheme: &str,
    trust_forwarded_for: bool,
) -> Option<RequestContext> {
    let url = request_url(request, default_scheme)?;

    let forwarded_for = trust_forwarded_for
        .then(|| forwarded_for(request.headers()))
        .flatten();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    Some(RequestContext::from_parts(
        url,
        forwarded_for.as_deref(),
        remote_addr.as_deref(),
    ))
}

/// Absolute URL of the request.
pub fn request_url(request: &Request<Body>, default_scheme: &str) -> Option<Url> {
    let headers = request.headers();
    let uri = request.uri();

    let scheme = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| v.eq_ignore_ascii_case("http") || v.eq_ignore_ascii_case("https"))
        .or(uri.scheme_str())
        .unwrap_or(default_scheme)
        .to_ascii_lowercase();

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))?;

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, host.trim(), path_and_query)).ok()
}

/// All X-Forwarded-For values, joined in order.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    (!values.is_empty()).then(|| values.join(","))
}
