//! Geo-redirect library.
//!
//! Decides, per request, whether to answer with a permanent redirect to the
//! hostname that serves the client's country, and carries that decision in
//! the client's session.

pub mod config;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod redirect;
pub mod routing;
pub mod session;

pub use config::schema::GeoRedirectConfig;
pub use http::{geo_redirect_middleware, HttpServer, RedirectState};
pub use lifecycle::Shutdown;
pub use redirect::{Decision, DecisionEngine, Outcome, RequestContext};
pub use routing::RoutingTable;
