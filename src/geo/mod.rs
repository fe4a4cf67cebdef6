//! GeoIP subsystem.
//!
//! # Data Flow
//! ```text
//! X-Forwarded-For / connection address
//!     → client_ip.rs (first hop only)
//!     → GeoLookup::lookup (MaxMind db, static table, or unavailable)
//!     → CountryRecord::country_code (zero/absent numeric code ⇒ no match)
//!     → CountryCode or nothing
//! ```
//!
//! # Design Decisions
//! - Failures are values (`LookupError`), never panics
//! - The engine consumes only the trait; loading the database is a
//!   start-up concern and a failure there degrades to `UnavailableLookup`

pub mod client_ip;
pub mod maxmind;

use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

use crate::routing::CountryCode;

pub use client_ip::client_ip;
pub use maxmind::MaxMindLookup;

/// Errors produced by a country lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The client address could not be parsed.
    #[error("invalid IP address: {0:?}")]
    InvalidAddress(String),

    /// The database has no record for the address.
    #[error("address not found: {0}")]
    AddressNotFound(IpAddr),

    /// No database is loaded.
    #[error("GeoIP database unavailable")]
    Unavailable,

    /// The database returned an error.
    #[error("GeoIP database error: {0}")]
    Database(String),
}

impl LookupError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            LookupError::InvalidAddress(_) => "invalid_address",
            LookupError::AddressNotFound(_) => "not_found",
            LookupError::Unavailable => "unavailable",
            LookupError::Database(_) => "database",
        }
    }
}

/// Raw country record returned by a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRecord {
    /// Numeric country identifier; zero or absent means "unrecognised".
    pub numeric_code: Option<u32>,
    /// Alphabetic country code.
    pub iso_code: Option<String>,
}

impl CountryRecord {
    pub fn new(numeric_code: u32, iso_code: impl Into<String>) -> Self {
        Self {
            numeric_code: Some(numeric_code),
            iso_code: Some(iso_code.into()),
        }
    }

    /// The usable country, if any.
    ///
    /// The alphabetic code is only trusted when the numeric code is non-zero.
    pub fn country_code(&self) -> Option<CountryCode> {
        match self.numeric_code {
            None | Some(0) => None,
            Some(_) => self
                .iso_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(CountryCode::new),
        }
    }
}

/// Country lookup keyed by client IP.
///
/// Implementations must be safe for concurrent use and enforce their own
/// timeouts; the engine never retries.
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Result<CountryRecord, LookupError>;
}

/// Stand-in used when no database could be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLookup;

impl GeoLookup for UnavailableLookup {
    fn lookup(&self, _ip: IpAddr) -> Result<CountryRecord, LookupError> {
        Err(LookupError::Unavailable)
    }
}

/// Fixed in-memory table, for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    records: HashMap<IpAddr, CountryRecord>,
    fallback: Option<CountryRecord>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `record` for `ip`.
    pub fn with(mut self, ip: IpAddr, record: CountryRecord) -> Self {
        self.records.insert(ip, record);
        self
    }

    /// Answer `record` for every address without an explicit entry.
    pub fn with_fallback(mut self, record: CountryRecord) -> Self {
        self.fallback = Some(record);
        self
    }
}

impl GeoLookup for StaticLookup {
    fn lookup(&self, ip: IpAddr) -> Result<CountryRecord, LookupError> {
        self.records
            .get(&ip)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or(LookupError::AddressNotFound(ip))
    }
}
