//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, in the binary
//! - Pick the log level from config, overridable through `RUST_LOG`
//! - Optionally append to a log file
//!
//! # Design Decisions
//! - Library code only emits events; it never installs a subscriber, so
//!   embedding applications that install none get no output
//! - An unopenable log file falls back to stdout

use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive for the configured level.
pub fn filter_directive(config: &ObservabilityConfig) -> String {
    format!("geo_redirect={level},tower_http={level}", level = config.log_level)
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let file = config.log_file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(file)),
            Err(e) => {
                eprintln!("Could not open log file {}: {}. Logging to stdout.", path, e);
                None
            }
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match file {
        Some(file) => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
            .init(),
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
