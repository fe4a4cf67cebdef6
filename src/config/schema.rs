//! Configuration schema definitions.
//!
//! This module defines the complete server configuration and the on-disk
//! shape of the routing file. All types derive Serde traits for
//! deserialization from config files.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Root configuration for the redirect server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeoRedirectConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where passed-through requests are forwarded.
    pub upstream: UpstreamConfig,

    /// GeoIP database settings.
    pub geoip: GeoIpConfig,

    /// Redirect decision settings.
    pub redirect: RedirectConfig,

    /// Session cookie and storage settings.
    pub session: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Downstream application the server forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// GeoIP database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// Path to a MaxMind country database.
    pub database_path: String,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            database_path: "db/GeoLite2-Country.mmdb".to_string(),
        }
    }
}

/// Redirect decision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Path to the routing file (TOML, or YAML by extension).
    pub routing_path: String,

    /// Query key that forces a redirect by current hostname.
    pub force_key: String,

    /// Query key that bypasses the engine.
    pub skip_key: String,

    /// If non-empty, only these exact paths are handled.
    #[serde(deserialize_with = "one_or_many")]
    pub include: Vec<String>,

    /// These exact paths are never handled.
    #[serde(deserialize_with = "one_or_many")]
    pub exclude: Vec<String>,

    /// Record the would-be decision into the session when skipping.
    pub remember_when_skipping: bool,

    /// Geolocate the first X-Forwarded-For hop instead of the peer address.
    pub trust_forwarded_for: bool,

    /// Scheme assumed when X-Forwarded-Proto is absent.
    pub default_scheme: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            routing_path: "config/routing.toml".to_string(),
            force_key: "redirect".to_string(),
            skip_key: "skip_geo".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            remember_when_skipping: false,
            trust_forwarded_for: true,
            default_scheme: "http".to_string(),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,

    /// Cookie lifetime in seconds.
    pub max_age_secs: u64,

    /// Mark the cookie `Secure`.
    pub secure: bool,

    /// JSON file sessions are loaded from at start and saved to on shutdown.
    pub persistence_path: Option<String>,

    /// Seconds between sweeps that drop expired sessions.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "geo_redirect_session".to_string(),
            max_age_secs: 30 * 24 * 60 * 60, // 30 days
            secure: false,
            persistence_path: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Append logs to this file instead of stdout.
    pub log_file: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One entry of the routing file, before normalisation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteEntryConfig {
    /// Destination hostname.
    #[serde(alias = ":host")]
    pub host: String,

    /// Countries routed to this host.
    #[serde(default, alias = ":countries", deserialize_with = "one_or_many")]
    pub countries: Vec<String>,
}

/// Accepts either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// The routing file: a mapping `key → entry`, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingFile {
    pub entries: Vec<(String, RouteEntryConfig)>,
}

impl<'de> Deserialize<'de> for RoutingFile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedEntries;

        impl<'de> Visitor<'de> for OrderedEntries {
            type Value = RoutingFile;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of host keys to { host, countries } entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, entry)) = map.next_entry::<String, RouteEntryConfig>()? {
                    entries.push((key, entry));
                }
                Ok(RoutingFile { entries })
            }
        }

        deserializer.deserialize_map(OrderedEntries)
    }
}
