//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the routing table (fatal on failure)
//! - Load the GeoIP database (degraded on failure)
//! - Load persisted sessions
//! - Assemble the decision engine
//!
//! # Design Decisions
//! - Fail fast: a routing table without `default` refuses to start
//! - A missing GeoIP database only disables country matching

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{load_routing, ConfigError, GeoIpConfig, GeoRedirectConfig, SessionConfig};
use crate::geo::{GeoLookup, MaxMindLookup, UnavailableLookup};
use crate::redirect::DecisionEngine;
use crate::session::MemorySessionStore;

/// Open the GeoIP database, or fall back to a lookup that always fails.
pub fn load_geo(config: &GeoIpConfig) -> Arc<dyn GeoLookup> {
    match MaxMindLookup::open(&config.database_path) {
        Ok(lookup) => Arc::new(lookup),
        Err(e) => {
            tracing::error!(
                path = %config.database_path,
                error = %e,
                "Could not load GeoIP database file. Country matching is disabled; \
                 fetch one with `geo-redirect-cli fetch-db`"
            );
            Arc::new(UnavailableLookup)
        }
    }
}

/// Build the engine from the server configuration.
pub fn build_engine(config: &GeoRedirectConfig) -> Result<DecisionEngine, ConfigError> {
    let routing_path = Path::new(&config.redirect.routing_path);
    let routing = load_routing(routing_path).map_err(|e| {
        tracing::error!(
            path = %routing_path.display(),
            error = %e,
            "Could not load routing file"
        );
        e
    })?;

    tracing::info!(entries = routing.len(), path = %routing_path.display(), "Routing table loaded");

    let geo = load_geo(&config.geoip);
    Ok(DecisionEngine::from_config(&config.redirect, routing, geo))
}

/// Open the session store, restoring persisted sessions when configured.
///
/// Sessions older than the cookie lifetime are dropped on load.
pub fn build_session_store(config: &SessionConfig) -> MemorySessionStore {
    let store = match &config.persistence_path {
        Some(path) => MemorySessionStore::load_from_file(path).unwrap_or_else(|e| {
            tracing::error!(path = %path, error = %e, "Could not load sessions, starting empty");
            MemorySessionStore::new(Some(path.into()))
        }),
        None => MemorySessionStore::new(None),
    };
    store.with_max_age(Duration::from_secs(config.max_age_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_routing_is_fatal() {
        let mut config = GeoRedirectConfig::default();
        config.redirect.routing_path = "/no_such_file.toml".into();
        assert!(build_engine(&config).is_err());
    }

    #[test]
    fn test_missing_geoip_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let routing = dir.path().join("routing.toml");
        std::fs::write(&routing, "[default]\nhost = \"c.example.com\"\n").unwrap();

        let mut config = GeoRedirectConfig::default();
        config.redirect.routing_path = routing.to_string_lossy().into_owned();
        config.geoip.database_path = "/no_such_file.mmdb".into();

        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.routing().len(), 1);
    }

    #[test]
    fn test_corrupt_session_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "garbage").unwrap();

        let mut config = SessionConfig::default();
        config.persistence_path = Some(path.to_string_lossy().into_owned());
        assert_eq!(build_session_store(&config).count(), 0);
    }

    #[test]
    fn test_expired_persisted_sessions_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{
                "6f1c2a4e-8f57-4d3c-9a51-0e7d2b1c9f10": {"geo_redirect": {"key": "us"}, "saved_at": 0},
                "0b8e7d5c-3a2f-4e1d-8c9b-7a6f5e4d3c2b": {"geo_redirect": {"key": "il"}, "saved_at": 18446744073709551615}
            }"#,
        )
        .unwrap();

        let mut config = SessionConfig::default();
        config.persistence_path = Some(path.to_string_lossy().into_owned());
        config.max_age_secs = 3600;

        let store = build_session_store(&config);
        assert_eq!(store.count(), 1);
        assert_eq!(store.max_age(), Duration::from_secs(3600));
    }
}
