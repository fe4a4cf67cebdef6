//! Metrics collection and exposition.
//!
//! # Metrics
//! - `geo_redirect_decisions_total` (counter): decisions by outcome and source
//! - `geo_redirect_lookup_failures_total` (counter): failed country lookups by reason
//! - `geo_redirect_session_forgotten_total` (counter): stale remembered hosts dropped
//! - `geo_redirect_sessions_expired_total` (counter): sessions dropped for age
//! - `geo_redirect_requests_total` (counter): HTTP requests by status
//! - `geo_redirect_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is optional

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::redirect::{Decision, DecisionSource, Outcome};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one engine decision.
pub fn record_decision(decision: &Decision) {
    let outcome = match (&decision.outcome, decision.source) {
        (_, DecisionSource::Gate(_)) => "skip",
        (Outcome::Pass, _) => "pass",
        (Outcome::RedirectTo { .. }, _) => "redirect",
    };

    counter!(
        "geo_redirect_decisions_total",
        "outcome" => outcome,
        "source" => decision.source.as_str()
    )
    .increment(1);

    if let DecisionSource::Gate(reason) = decision.source {
        counter!("geo_redirect_skips_total", "reason" => reason.as_str()).increment(1);
    }
}

/// Record a failed country lookup.
pub fn record_lookup_failure(reason: &'static str) {
    counter!("geo_redirect_lookup_failures_total", "reason" => reason).increment(1);
}

/// Record a stale remembered host being dropped.
pub fn record_session_forgotten() {
    counter!("geo_redirect_session_forgotten_total").increment(1);
}

/// Record sessions dropped for exceeding their lifetime.
pub fn record_sessions_expired(count: usize) {
    counter!("geo_redirect_sessions_expired_total").increment(count as u64);
}

/// Record a completed HTTP request.
pub fn record_request(status: u16, start: Instant) {
    counter!("geo_redirect_requests_total", "status" => status.to_string()).increment(1);
    histogram!("geo_redirect_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
