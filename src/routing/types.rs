//! Routing value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier naming one configured redirect destination.
///
/// Keys are normalised once at load time; nothing downstream compares a raw
/// string against a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostKey(String);

impl HostKey {
    /// Name of the reserved fallback key.
    pub const DEFAULT: &'static str = "default";

    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_string())
    }

    /// The reserved `default` key.
    pub fn default_key() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alphabetic country code as reported by the GeoIP lookup.
///
/// Stored upper-case. Lookups are not required to return ISO-3166 codes, so
/// no length check happens here; the config validator enforces two letters
/// for codes that appear in the routing file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for a two-letter alphabetic code.
    pub fn is_iso_alpha2(&self) -> bool {
        self.0.len() == 2 && self.0.bytes().all(|b| b.is_ascii_alphabetic())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One configured destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Hostname requests are redirected to.
    pub hostname: String,
    /// Countries routed here, in configured order, without duplicates.
    /// Empty means the entry never matches by country.
    pub countries: Vec<CountryCode>,
}

impl RouteEntry {
    pub fn new<I, C>(hostname: impl Into<String>, countries: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let mut ordered: Vec<CountryCode> = Vec::new();
        for code in countries {
            let code = CountryCode::new(code);
            if !ordered.contains(&code) {
                ordered.push(code);
            }
        }

        Self {
            hostname: hostname.into().trim().to_ascii_lowercase(),
            countries: ordered,
        }
    }

    /// An entry reachable only by key or hostname.
    pub fn hostname_only(hostname: impl Into<String>) -> Self {
        Self::new(hostname, std::iter::empty::<&str>())
    }

    pub fn serves_country(&self, country: &CountryCode) -> bool {
        self.countries.contains(country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_codes_are_upper_cased_and_deduped() {
        let entry = RouteEntry::new("A.Example.com", ["us", "CA", "US"]);
        assert_eq!(entry.hostname, "a.example.com");
        assert_eq!(entry.countries, vec![CountryCode::new("US"), CountryCode::new("CA")]);
    }

    #[test]
    fn test_hostname_only_never_serves_a_country() {
        let entry = RouteEntry::hostname_only("c.example.com");
        assert!(!entry.serves_country(&CountryCode::new("US")));
    }

    #[test]
    fn test_iso_alpha2() {
        assert!(CountryCode::new("il").is_iso_alpha2());
        assert!(!CountryCode::new("ISR").is_iso_alpha2());
        assert!(!CountryCode::new("1L").is_iso_alpha2());
    }

    #[test]
    fn test_default_key() {
        assert!(HostKey::default_key().is_default());
        assert!(!HostKey::new("us").is_default());
        assert_eq!(HostKey::new(" il ").as_str(), "il");
    }
}
