//! Redirect decision subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (url, client ip) + SessionMemory
//!     → gate.rs    skip flag / include / exclude / predicate → Pass
//!     → engine.rs  Force → Session → GeoIP                  → target host or Pass
//!     → rewrite.rs should_redirect (suffix match)           → Pass if already there
//!     → rewrite.rs UrlRewriter (host swap, port cleared,
//!                  control keys stripped)                   → RedirectTo(location)
//! ```
//!
//! # Design Decisions
//! - One synchronous decision per request; no locks inside the engine
//! - Every per-request failure degrades to the next fallback, then to Pass
//! - Nothing crosses the public boundary except an Outcome

pub mod engine;
pub mod gate;
pub mod rewrite;

use url::Url;

use crate::geo::client_ip;

pub use engine::{Decision, DecisionEngine, DecisionSource};
pub use gate::{Gate, SkipPredicate, SkipReason};
pub use rewrite::{should_redirect, RewriteError, UrlRewriter};

/// Read-only view of one incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    url: Url,
    client_ip: Option<String>,
}

impl RequestContext {
    /// Context for an absolute request URL with no known client address.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client_ip: None,
        }
    }

    /// Context whose client address is taken from the forwarded-for chain
    /// (first hop) or, failing that, the connection address.
    pub fn from_parts(url: Url, forwarded_for: Option<&str>, remote_addr: Option<&str>) -> Self {
        Self {
            url,
            client_ip: client_ip(forwarded_for, remote_addr),
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request host, without port.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Raw client address, unparsed.
    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    /// Whether the query string carries `key`, with or without a value.
    pub fn has_query_key(&self, key: &str) -> bool {
        self.url.query_pairs().any(|(k, _)| k == key)
    }
}

/// Result of running the engine for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the request to the downstream handler unchanged.
    Pass,
    /// Answer with a permanent redirect.
    RedirectTo {
        /// Destination hostname.
        hostname: String,
        /// Set on the force path: redirect even to the current host.
        rewrite_origin_host: bool,
        /// Rewritten URL for the `Location` header.
        location: Url,
    },
}

impl Outcome {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::RedirectTo { .. })
    }

    pub fn location(&self) -> Option<&Url> {
        match self {
            Outcome::Pass => None,
            Outcome::RedirectTo { location, .. } => Some(location),
        }
    }
}
