//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, timeouts)
//!     → middleware.rs (session in, decision, session out)
//!         → request.rs (absolute URL, client address)
//!         → response.rs (301 + Location) on redirect
//!     → upstream forwarder on pass
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{geo_redirect_middleware, RedirectState};
pub use request::{request_context, request_url};
pub use response::{redirect_response, REDIRECT_BODY};
pub use server::{HttpServer, UpstreamState};
