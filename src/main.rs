//! Geo-redirect front server.
//!
//! Sends each visitor to the hostname that serves their country, and forwards
//! everything else to one upstream application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server ─▶ geo_redirect_middleware ─┬─▶ 301 Location
//!                                        │        ▲           │
//!                                        ▼        │           └─▶ upstream forwarder ─▶ Upstream
//!                                  DecisionEngine  session store
//!                                   │    │
//!                        routing table  GeoIP lookup
//!                        (hot reload)   (MaxMind)
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use geo_redirect::config::{load_config, GeoRedirectConfig, RoutingWatcher};
use geo_redirect::http::HttpServer;
use geo_redirect::lifecycle::{build_engine, build_session_store, spawn_signal_handler, Shutdown};
use geo_redirect::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "geo-redirect")]
#[command(about = "Country-aware redirect server", long_about = None)]
struct Args {
    /// Server configuration file.
    #[arg(short, long, default_value = "config/geo_redirect.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        eprintln!(
            "Config file {} not found, using defaults",
            args.config.display()
        );
        GeoRedirectConfig::default()
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "geo-redirect starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        routing = %config.redirect.routing_path,
        geoip = %config.geoip.database_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = build_engine(&config)?;
    let sessions = build_session_store(&config.session);

    let (watcher, routing_updates) = RoutingWatcher::new(Path::new(&config.redirect.routing_path));
    // Dropping the handle stops the watch.
    let _watch = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Routing hot reload disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, engine, sessions);
    server.run(listener, routing_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
