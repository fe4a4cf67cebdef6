//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: geo-redirect middleware in front of an upstream forwarder
//! - Wire up tracing and timeout layers
//! - Apply routing-table reloads to the live engine
//! - Sweep expired sessions while serving
//! - Persist sessions once the listener has drained

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GeoRedirectConfig;
use crate::http::middleware::{geo_redirect_middleware, RedirectState};
use crate::redirect::DecisionEngine;
use crate::routing::RoutingTable;
use crate::session::MemorySessionStore;

/// State for the upstream forwarder.
#[derive(Clone)]
pub struct UpstreamState {
    pub address: Arc<str>,
    pub client: Client<HttpConnector, Body>,
}

impl UpstreamState {
    pub fn new(address: &str) -> Self {
        Self {
            address: Arc::from(address),
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

/// HTTP server fronting the upstream application.
pub struct HttpServer {
    router: Router,
    engine: DecisionEngine,
    sessions: MemorySessionStore,
    sweep_interval: Duration,
}

impl HttpServer {
    pub fn new(config: GeoRedirectConfig, engine: DecisionEngine, sessions: MemorySessionStore) -> Self {
        let redirect_state =
            RedirectState::from_config(&config, engine.clone(), Arc::new(sessions.clone()));
        let upstream_state = UpstreamState::new(&config.upstream.address);

        let router = Self::build_router(&config, redirect_state, upstream_state);
        Self {
            router,
            engine,
            sessions,
            sweep_interval: Duration::from_secs(config.session.sweep_interval_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GeoRedirectConfig,
        redirect_state: RedirectState,
        upstream_state: UpstreamState,
    ) -> Router {
        Router::new()
            .fallback(forward_handler)
            .with_state(upstream_state)
            .layer(middleware::from_fn_with_state(redirect_state, geo_redirect_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, applying routing reloads as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut routing_updates: mpsc::UnboundedReceiver<RoutingTable>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let engine = self.engine.clone();
        let reloader = tokio::spawn(async move {
            while let Some(table) = routing_updates.recv().await {
                tracing::info!(entries = table.len(), "Applying reloaded routing table");
                engine.replace_routing(table);
            }
        });

        let sweeper = self
            .sessions
            .spawn_sweeper(self.sweep_interval, shutdown.resubscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reloader.abort();
        sweeper.abort();

        if let Err(e) = self.sessions.save_to_file() {
            tracing::error!(error = %e, "Failed to persist sessions");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward a passed-through request to the upstream application.
async fn forward_handler(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    let authority = match Authority::from_str(&state.address) {
        Ok(authority) => authority,
        Err(e) => {
            tracing::error!(upstream = %state.address, error = %e, "Invalid upstream address");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(upstream = %state.address, error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    tracing::debug!(uri = %parts.uri, method = %parts.method, "Forwarding request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(upstream = %state.address, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
