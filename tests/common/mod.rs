//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{body::Body, http::Request, middleware, response::Response, routing::get, Router};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use geo_redirect::geo::{CountryRecord, StaticLookup};
use geo_redirect::http::{geo_redirect_middleware, RedirectState};
use geo_redirect::redirect::DecisionEngine;
use geo_redirect::routing::{HostKey, RouteEntry, RoutingTable};
use geo_redirect::session::MemorySessionStore;

pub const US_IP: &str = "203.0.113.10";
pub const IL_IP: &str = "198.51.100.20";
pub const FR_IP: &str = "192.0.2.30";
pub const DOWNSTREAM_BODY: &str = "Hello world!";

/// us → a.example.com (US, CA), il → b.example.co.il (IL), default → c.example.com.
pub fn routing_table() -> RoutingTable {
    RoutingTable::new([
        (HostKey::new("us"), RouteEntry::new("a.example.com", ["US", "CA"])),
        (HostKey::new("il"), RouteEntry::new("b.example.co.il", ["IL"])),
        (HostKey::default_key(), RouteEntry::hostname_only("c.example.com")),
    ])
    .unwrap()
}

pub const ROUTING_TOML: &str = r#"
[us]
host = "a.example.com"
countries = ["US", "CA"]

[il]
host = "b.example.co.il"
countries = "IL"

[default]
host = "c.example.com"
"#;

/// Lookup that knows the three fixture addresses.
pub fn geo_lookup() -> StaticLookup {
    StaticLookup::new()
        .with(US_IP.parse().unwrap(), CountryRecord::new(6252001, "US"))
        .with(IL_IP.parse().unwrap(), CountryRecord::new(294640, "IL"))
        .with(FR_IP.parse().unwrap(), CountryRecord::new(3017382, "FR"))
}

pub fn engine() -> DecisionEngine {
    DecisionEngine::new(routing_table()).with_geo(Arc::new(geo_lookup()))
}

/// Downstream app behind the middleware, answering "Hello world!".
pub fn app(engine: DecisionEngine, sessions: MemorySessionStore) -> Router {
    let state = RedirectState::new(engine, Arc::new(sessions));
    Router::new()
        .route("/", get(|| async { DOWNSTREAM_BODY }))
        .route("/{*path}", get(|| async { DOWNSTREAM_BODY }))
        .layer(middleware::from_fn_with_state(state, geo_redirect_middleware))
}

/// GET `path` on `host`, optionally from `ip` and with a cookie.
pub fn get_request(host: &str, path: &str, ip: Option<&str>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path).header("host", host);
    if let Some(ip) = ip {
        builder = builder.header("x-forwarded-for", ip);
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` part of the response's Set-Cookie header.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Start a simple mock upstream that returns a fixed response.
pub async fn start_mock_upstream(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
