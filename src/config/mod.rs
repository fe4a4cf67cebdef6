//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server config (TOML)              routing file (TOML/YAML)
//!     → loader.rs (parse)               → loader.rs (parse, document order)
//!     → validation.rs                   → validation.rs (`default`, hosts, countries)
//!     → GeoRedirectConfig               → RoutingTable (immutable)
//!
//! On routing file change:
//!     watcher.rs detects change
//!     → loader.rs loads new table
//!     → atomic swap of Arc<RoutingTable>
//!     → next request sees the new table
//! ```
//!
//! # Design Decisions
//! - All server config fields have defaults to allow minimal configs
//! - A routing file without `default` is fatal at start-up
//! - A failed reload keeps the current table

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_routing, ConfigError, RoutingFormat};
pub use schema::{
    GeoIpConfig, GeoRedirectConfig, ListenerConfig, ObservabilityConfig, RedirectConfig,
    RouteEntryConfig, RoutingFile, SessionConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
pub use watcher::RoutingWatcher;
