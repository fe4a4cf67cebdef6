//! Per-client session memory.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → cookie.rs (session id)
//!     → store.rs (SessionData for that id, or empty)
//!     → engine reads/writes through SessionMemory
//!     → changed? save + Set-Cookie
//! ```
//!
//! # Design Decisions
//! - The remembered host is a tagged union, never a dynamically typed value
//! - The remembered country is diagnostic only; decisions never read it
//! - Storage is behind a trait; the shipped store is in-memory (dashmap)

pub mod cookie;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::routing::{CountryCode, HostKey, RoutingTable};

pub use store::{MemorySessionStore, SessionId, SessionStore, SessionStoreError};

/// Logical session field holding the remembered host.
pub const HOST_FIELD: &str = "geo_redirect";
/// Logical session field holding the last discovered country.
pub const COUNTRY_FIELD: &str = "geo_redirect.country";

/// A previously made decision, replayed on later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RememberedHost {
    /// A configured destination.
    Key(HostKey),
    /// A literal hostname.
    Literal(String),
}

impl RememberedHost {
    /// Hostname this memory points at, if it is still valid for `table`.
    ///
    /// A key must exist in the table. A literal must equal one of the
    /// configured hostnames; anything else is stale.
    pub fn resolve<'a>(&'a self, table: &'a RoutingTable) -> Option<&'a str> {
        match self {
            RememberedHost::Key(key) => table.hostname(key),
            RememberedHost::Literal(hostname) => {
                table.has_hostname(hostname).then_some(hostname.as_str())
            }
        }
    }
}

impl fmt::Display for RememberedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RememberedHost::Key(key) => write!(f, ":{}", key),
            RememberedHost::Literal(hostname) => f.write_str(hostname),
        }
    }
}

impl From<HostKey> for RememberedHost {
    fn from(key: HostKey) -> Self {
        RememberedHost::Key(key)
    }
}

/// Get/set access to the two session fields the engine owns.
pub trait SessionMemory {
    fn remembered_host(&self) -> Option<RememberedHost>;
    fn set_remembered_host(&mut self, host: Option<RememberedHost>);
    fn remembered_country(&self) -> Option<CountryCode>;
    fn set_remembered_country(&mut self, country: Option<CountryCode>);
}

/// Session values for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "geo_redirect", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<RememberedHost>,
    #[serde(rename = "geo_redirect.country", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryCode>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.country.is_none()
    }
}

impl SessionMemory for SessionData {
    fn remembered_host(&self) -> Option<RememberedHost> {
        self.host.clone()
    }

    fn set_remembered_host(&mut self, host: Option<RememberedHost>) {
        self.host = host;
    }

    fn remembered_country(&self) -> Option<CountryCode> {
        self.country.clone()
    }

    fn set_remembered_country(&mut self, country: Option<CountryCode>) {
        self.country = country;
    }
}
