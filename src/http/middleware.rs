//! Geo-redirect middleware.
//!
//! # Responsibilities
//! - Run the decision engine in front of any downstream handler
//! - Load and store the per-client session around each decision
//! - Answer redirects, pass everything else through untouched
//!
//! # Design Decisions
//! - A session cookie is only issued when the engine changed the session
//! - Requests whose URL cannot be rebuilt go straight downstream
//!
//! # Usage
//! ```ignore
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(state, geo_redirect_middleware));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{GeoRedirectConfig, SessionConfig};
use crate::http::request::request_context;
use crate::http::response::redirect_response;
use crate::observability::metrics;
use crate::redirect::{DecisionEngine, Outcome};
use crate::session::cookie::{session_id_from_headers, set_cookie_value};
use crate::session::{SessionData, SessionId, SessionStore};

/// Shared state for [`geo_redirect_middleware`].
#[derive(Clone)]
pub struct RedirectState {
    engine: DecisionEngine,
    sessions: Arc<dyn SessionStore>,
    session_config: Arc<SessionConfig>,
    default_scheme: Arc<str>,
    trust_forwarded_for: bool,
}

impl RedirectState {
    pub fn new(engine: DecisionEngine, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            engine,
            sessions,
            session_config: Arc::new(SessionConfig::default()),
            default_scheme: Arc::from("http"),
            trust_forwarded_for: true,
        }
    }

    /// State wired from the server configuration.
    pub fn from_config(
        config: &GeoRedirectConfig,
        engine: DecisionEngine,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self::new(engine, sessions)
            .session_config(config.session.clone())
            .default_scheme(&config.redirect.default_scheme)
            .trust_forwarded_for(config.redirect.trust_forwarded_for)
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = Arc::new(config);
        self
    }

    pub fn default_scheme(mut self, scheme: &str) -> Self {
        self.default_scheme = Arc::from(scheme);
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }
}

/// Redirect the request or hand it to `next`.
pub async fn geo_redirect_middleware(
    State(state): State<RedirectState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let Some(ctx) = request_context(&request, &state.default_scheme, state.trust_forwarded_for)
    else {
        tracing::debug!(uri = %request.uri(), "No usable request URL, passing through");
        return next.run(request).await;
    };

    let existing_id =
        session_id_from_headers(request.headers(), &state.session_config.cookie_name);
    let before = existing_id
        .as_ref()
        .and_then(|id| state.sessions.load(id))
        .unwrap_or_default();

    let mut session: SessionData = before.clone();
    let decision = state.engine.decide(&ctx, &mut session);

    let issued_id = if session != before {
        let id = existing_id.unwrap_or_else(SessionId::generate);
        state.sessions.save(&id, session);
        Some(id)
    } else {
        None
    };

    tracing::debug!(
        host = ctx.host(),
        path = ctx.path(),
        client_ip = ctx.client_ip().unwrap_or("-"),
        source = decision.source.as_str(),
        redirect = decision.outcome.is_redirect(),
        "Redirect decision"
    );

    let mut response = match decision.outcome {
        Outcome::RedirectTo { location, .. } => match redirect_response(&location) {
            Ok(response) => {
                tracing::info!(location = %location, source = decision.source.as_str(), "Redirecting");
                response
            }
            Err(e) => {
                tracing::error!(location = %location, error = %e, "Unusable redirect location, passing through");
                next.run(request).await
            }
        },
        Outcome::Pass => next.run(request).await,
    };

    if let Some(id) = issued_id {
        if let Some(cookie) = set_cookie_value(&state.session_config, &id) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }

    metrics::record_request(response.status().as_u16(), start_time);
    response
}
