//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! routing file (TOML/YAML mapping, document order)
//!     → config::loader (parse, normalise keys to HostKey)
//!     → RoutingTable::new (dedupe countries, require `default`)
//!     → shared behind ArcSwap; swapped whole on reload
//!
//! Per request:
//!     country code  → resolve_by_country  → HostKey
//!     request host  → resolve_by_hostname → HostKey
//!     HostKey       → hostname            → redirect target
//! ```
//!
//! # Design Decisions
//! - Table is immutable once built (thread-safe without locks)
//! - Insertion order is the tie-break: first match wins
//! - Every miss falls back to the reserved `default` key

pub mod table;
pub mod types;

pub use table::{RoutingError, RoutingTable};
pub use types::{CountryCode, HostKey, RouteEntry};
