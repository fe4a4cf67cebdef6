//! Geo-redirect middleware driven in-process.

use axum::http::StatusCode;
use std::time::Duration;

use geo_redirect::redirect::Gate;
use geo_redirect::session::{
    MemorySessionStore, RememberedHost, SessionData, SessionId, SessionStore,
};
use geo_redirect::routing::HostKey;

mod common;
use common::*;

fn location(response: &axum::response::Response) -> &str {
    response.headers()["location"].to_str().unwrap()
}

#[tokio::test]
async fn test_visitor_on_own_country_host_passes() {
    let sessions = MemorySessionStore::new(None);
    let app = app(engine(), sessions.clone());

    let response = send(&app, get_request("b.example.co.il", "/", Some(IL_IP), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("session cookie issued");
    assert_eq!(body_string(response).await, DOWNSTREAM_BODY);

    let id: SessionId = cookie.split_once('=').unwrap().1.parse().unwrap();
    let data = sessions.load(&id).unwrap();
    assert_eq!(data.host, Some(RememberedHost::Key(HostKey::new("il"))));
    assert_eq!(data.country.as_ref().map(|c| c.as_str()), Some("IL"));
}

#[tokio::test]
async fn test_visitor_on_foreign_host_is_redirected() {
    let app = app(engine(), MemorySessionStore::new(None));

    let response = send(&app, get_request("b.example.co.il", "/shop?item=3", Some(US_IP), None)).await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "http://a.example.com/shop?item=3");
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert!(session_cookie(&response).is_some());
    assert_eq!(body_string(response).await, "Moved Permanently\n");
}

#[tokio::test]
async fn test_force_flag_redirects_to_current_host_without_flag() {
    let app = app(engine(), MemorySessionStore::new(None));

    let response = send(
        &app,
        get_request("b.example.co.il", "/?redirect=1&lang=he", Some(US_IP), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "http://b.example.co.il/?lang=he");
}

#[tokio::test]
async fn test_remembered_host_is_replayed_through_cookie() {
    let sessions = MemorySessionStore::new(None);
    let app = app(engine(), sessions);

    let first = send(&app, get_request("a.example.com", "/", Some(US_IP), None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = session_cookie(&first).unwrap();

    // Same client, now from an Israeli address: the session wins.
    let second = send(&app, get_request("b.example.co.il", "/", Some(IL_IP), Some(&cookie))).await;
    assert_eq!(second.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&second), "http://a.example.com/");
    assert!(session_cookie(&second).is_none());
}

#[tokio::test]
async fn test_stale_remembered_host_falls_through_to_geoip() {
    let sessions = MemorySessionStore::new(None);
    let id = SessionId::generate();
    sessions.save(
        &id,
        SessionData {
            host: Some(RememberedHost::Key(HostKey::new("foo"))),
            country: None,
        },
    );
    let app = app(engine(), sessions.clone());

    let response = send(
        &app,
        get_request("c.example.com", "/", Some(IL_IP), Some(&format!("geo_redirect_session={}", id))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "http://b.example.co.il/");
    assert_eq!(
        sessions.load(&id).unwrap().host,
        Some(RememberedHost::Key(HostKey::new("il")))
    );
}

#[tokio::test]
async fn test_skip_flag_passes_and_leaves_session_alone() {
    let sessions = MemorySessionStore::new(None);
    let app = app(engine(), sessions.clone());

    let response = send(&app, get_request("b.example.co.il", "/?skip_geo=1", Some(US_IP), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(sessions.count(), 0);
    assert_eq!(body_string(response).await, DOWNSTREAM_BODY);
}

#[tokio::test]
async fn test_unknown_country_goes_to_default() {
    let app = app(engine(), MemorySessionStore::new(None));

    let response = send(&app, get_request("a.example.com", "/", Some(FR_IP), None)).await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "http://c.example.com/");
}

#[tokio::test]
async fn test_no_client_address_passes() {
    let sessions = MemorySessionStore::new(None);
    let app = app(engine(), sessions.clone());

    let response = send(&app, get_request("b.example.co.il", "/", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(sessions.count(), 0);
}

#[tokio::test]
async fn test_subdomain_of_target_is_not_redirected() {
    let app = app(engine(), MemorySessionStore::new(None));

    let response = send(&app, get_request("shop.a.example.com", "/", Some(US_IP), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("evila.example.com", "/", Some(US_IP), None)).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn test_include_and_exclude_paths() {
    let gate = Gate::new("skip_geo").include(["/", "/landing"]).exclude(["/landing"]);
    let app = app(engine().with_gate(gate), MemorySessionStore::new(None));

    let response = send(&app, get_request("b.example.co.il", "/", Some(US_IP), None)).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);

    let response = send(&app, get_request("b.example.co.il", "/landing", Some(US_IP), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("b.example.co.il", "/about", Some(US_IP), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_proto_is_kept_in_location() {
    let app = app(engine(), MemorySessionStore::new(None));

    let mut request = get_request("b.example.co.il:8443", "/x", Some(US_IP), None);
    request
        .headers_mut()
        .insert("x-forwarded-proto", "https".parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "https://a.example.com/x");
}

#[tokio::test]
async fn test_routing_reload_applies_to_next_request() {
    let engine = engine();
    let app = app(engine.clone(), MemorySessionStore::new(None));

    let table = geo_redirect::config::loader::parse_routing(
        &ROUTING_TOML.replace("a.example.com", "us.example.com"),
        geo_redirect::config::RoutingFormat::Toml,
    )
    .unwrap();
    engine.replace_routing(table);

    let response = send(&app, get_request("b.example.co.il", "/", Some(US_IP), None)).await;
    assert_eq!(location(&response), "http://us.example.com/");
}

#[tokio::test]
async fn test_shared_store_across_routers() {
    let sessions = MemorySessionStore::new(None);
    let app_a = app(engine(), sessions.clone());
    let app_b = app(engine(), sessions);

    let first = send(&app_a, get_request("a.example.com", "/", Some(US_IP), None)).await;
    let cookie = session_cookie(&first).unwrap();

    let second = send(&app_b, get_request("a.example.com", "/", Some(IL_IP), Some(&cookie))).await;
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_is_not_replayed() {
    let sessions = MemorySessionStore::new(None).with_max_age(Duration::ZERO);
    let app = app(engine(), sessions.clone());

    let first = send(&app, get_request("a.example.com", "/", Some(US_IP), None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = session_cookie(&first).unwrap();

    // Without a live session the Israeli address decides.
    let second = send(&app, get_request("a.example.com", "/", Some(IL_IP), Some(&cookie))).await;
    assert_eq!(second.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&second), "http://b.example.co.il/");
}

#[tokio::test]
async fn test_expired_persisted_session_is_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let id = SessionId::generate();
    std::fs::write(
        &path,
        format!(r#"{{"{}": {{"geo_redirect": {{"key": "us"}}, "saved_at": 0}}}}"#, id),
    )
    .unwrap();

    let sessions = MemorySessionStore::load_from_file(&path)
        .unwrap()
        .with_max_age(Duration::from_secs(3600));
    assert_eq!(sessions.count(), 0);
    let app = app(engine(), sessions.clone());

    let response = send(
        &app,
        get_request("a.example.com", "/", Some(IL_IP), Some(&format!("geo_redirect_session={}", id))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "http://b.example.co.il/");
    assert_eq!(
        sessions.load(&id).unwrap().host,
        Some(RememberedHost::Key(HostKey::new("il")))
    );
}
