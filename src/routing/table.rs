//! Host-key lookup table.
//!
//! # Responsibilities
//! - Store the configured destinations in configuration order
//! - Resolve a country or a hostname to a HostKey
//! - Guarantee the `default` fallback exists
//!
//! # Design Decisions
//! - O(n) scans: route tables hold a handful of entries
//! - Hostname comparison ignores ASCII case

use thiserror::Error;

use crate::routing::types::{CountryCode, HostKey, RouteEntry};

/// Errors raised while building a routing table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The reserved fallback entry is absent.
    #[error("routing table has no `{}` entry", HostKey::DEFAULT)]
    MissingDefault,

    /// The same key was configured twice.
    #[error("duplicate host key `{0}`")]
    DuplicateKey(HostKey),
}

/// Ordered mapping `HostKey → RouteEntry`.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    entries: Vec<(HostKey, RouteEntry)>,
    default_index: usize,
}

impl RoutingTable {
    /// Build a table, keeping the given order.
    pub fn new<I>(entries: I) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = (HostKey, RouteEntry)>,
    {
        let mut ordered: Vec<(HostKey, RouteEntry)> = Vec::new();
        for (key, entry) in entries {
            if ordered.iter().any(|(k, _)| *k == key) {
                return Err(RoutingError::DuplicateKey(key));
            }
            ordered.push((key, entry));
        }

        let default_index = ordered
            .iter()
            .position(|(k, _)| k.is_default())
            .ok_or(RoutingError::MissingDefault)?;

        Ok(Self {
            entries: ordered,
            default_index,
        })
    }

    pub fn get(&self, key: &HostKey) -> Option<&RouteEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn contains(&self, key: &HostKey) -> bool {
        self.get(key).is_some()
    }

    /// Hostname configured for `key`.
    pub fn hostname(&self, key: &HostKey) -> Option<&str> {
        self.get(key).map(|e| e.hostname.as_str())
    }

    /// The `default` entry. Always present.
    pub fn default_entry(&self) -> &RouteEntry {
        &self.entries[self.default_index].1
    }

    /// First key (in table order) whose countries contain `country`, else `default`.
    pub fn resolve_by_country(&self, country: &CountryCode) -> HostKey {
        self.entries
            .iter()
            .find(|(_, e)| e.serves_country(country))
            .map(|(k, _)| k.clone())
            .unwrap_or_else(HostKey::default_key)
    }

    /// First key (in table order) whose hostname equals `hostname`, else `default`.
    pub fn resolve_by_hostname(&self, hostname: &str) -> HostKey {
        self.key_for_hostname(hostname)
            .cloned()
            .unwrap_or_else(HostKey::default_key)
    }

    /// Whether some entry is configured with exactly this hostname.
    pub fn has_hostname(&self, hostname: &str) -> bool {
        self.key_for_hostname(hostname).is_some()
    }

    fn key_for_hostname(&self, hostname: &str) -> Option<&HostKey> {
        let hostname = hostname.trim();
        self.entries
            .iter()
            .find(|(_, e)| e.hostname.eq_ignore_ascii_case(hostname))
            .map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HostKey, &RouteEntry)> {
        self.entries.iter().map(|(k, e)| (k, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
