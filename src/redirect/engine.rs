//! The redirect decision state machine.
//!
//! ```text
//! Start → Gate ─skip─▶ Pass (optionally recording the would-be decision)
//!           │
//!           ▼
//!       CheckForce ─force key─▶ remember(host by current hostname) → RedirectTo(current host, forced)
//!           │
//!           ▼
//!       CheckSession ─valid─▶ RedirectTo(remembered host)
//!           │ stale → forget
//!           ▼
//!       CheckGeoIP ─country─▶ remember(host by country), record country → RedirectTo(host)
//!           │ no country
//!           ▼
//!          Pass
//! ```
//!
//! A RedirectTo whose target already matches the current host becomes Pass.

use arc_swap::ArcSwap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::RedirectConfig;
use crate::geo::{GeoLookup, LookupError, UnavailableLookup};
use crate::observability::metrics;
use crate::redirect::gate::{Gate, SkipReason};
use crate::redirect::rewrite::{should_redirect, UrlRewriter};
use crate::redirect::{Outcome, RequestContext};
use crate::routing::{CountryCode, RoutingTable};
use crate::session::{RememberedHost, SessionMemory};

/// Which step produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// The gate bypassed the engine.
    Gate(SkipReason),
    /// The force key was present.
    Force,
    /// A valid remembered host.
    Session,
    /// A country lookup.
    GeoIp,
    /// Nothing matched.
    NoMatch,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Gate(_) => "gate",
            DecisionSource::Force => "force",
            DecisionSource::Session => "session",
            DecisionSource::GeoIp => "geoip",
            DecisionSource::NoMatch => "none",
        }
    }
}

/// Outcome plus the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub source: DecisionSource,
}

impl Decision {
    fn pass(source: DecisionSource) -> Self {
        Self {
            outcome: Outcome::Pass,
            source,
        }
    }
}

/// Why the state machine is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evaluation {
    /// A real decision: the country is stored and lookup failures counted.
    Decide,
    /// A skipped request: only the remembered host is written.
    RememberOnly,
}

/// Host chosen by the state machine, before the same-host check.
struct Target {
    hostname: String,
    rewrite_origin_host: bool,
}

/// Decides, per request, between passing through and redirecting.
///
/// Cheap to share: the routing table sits behind an `ArcSwap` so a reload
/// replaces it whole while in-flight requests keep their snapshot.
#[derive(Clone)]
pub struct DecisionEngine {
    routing: Arc<ArcSwap<RoutingTable>>,
    geo: Arc<dyn GeoLookup>,
    gate: Gate,
    rewriter: UrlRewriter,
    force_key: String,
    remember_when_skipping: bool,
}

impl DecisionEngine {
    /// Engine with default control keys, no path lists, and no GeoIP database.
    pub fn new(routing: RoutingTable) -> Self {
        let defaults = RedirectConfig::default();
        Self {
            routing: Arc::new(ArcSwap::from_pointee(routing)),
            geo: Arc::new(UnavailableLookup),
            gate: Gate::new(defaults.skip_key.clone()),
            rewriter: UrlRewriter::new(defaults.force_key.clone(), defaults.skip_key),
            force_key: defaults.force_key,
            remember_when_skipping: defaults.remember_when_skipping,
        }
    }

    /// Engine configured from the `[redirect]` section.
    pub fn from_config(config: &RedirectConfig, routing: RoutingTable, geo: Arc<dyn GeoLookup>) -> Self {
        Self {
            routing: Arc::new(ArcSwap::from_pointee(routing)),
            geo,
            gate: Gate::new(config.skip_key.clone())
                .include(config.include.iter().cloned())
                .exclude(config.exclude.iter().cloned()),
            rewriter: UrlRewriter::new(config.force_key.clone(), config.skip_key.clone()),
            force_key: config.force_key.clone(),
            remember_when_skipping: config.remember_when_skipping,
        }
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    /// Replace the bypass rules. The gate's skip key should match the
    /// rewriter's.
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn remember_when_skipping(mut self, remember: bool) -> Self {
        self.remember_when_skipping = remember;
        self
    }

    /// Current routing table snapshot.
    pub fn routing(&self) -> Arc<RoutingTable> {
        self.routing.load_full()
    }

    /// Swap in a new routing table.
    pub fn replace_routing(&self, routing: RoutingTable) {
        tracing::info!(entries = routing.len(), "Routing table replaced");
        self.routing.store(Arc::new(routing));
    }

    /// Run the gate and the state machine for one request.
    pub fn decide<S>(&self, ctx: &RequestContext, session: &mut S) -> Decision
    where
        S: SessionMemory + ?Sized,
    {
        let table = self.routing.load();

        if let Some(reason) = self.gate.skip_reason(ctx) {
            tracing::debug!(reason = reason.as_str(), path = ctx.path(), "Skipping geo redirect");
            if self.remember_when_skipping {
                self.remember_while_skipping(&table, ctx, session);
            }
            let decision = Decision::pass(DecisionSource::Gate(reason));
            metrics::record_decision(&decision);
            return decision;
        }

        let (target, source) = self.evaluate(&table, ctx, session, Evaluation::Decide);
        let decision = match target {
            None => Decision::pass(source),
            Some(target) => self.render(ctx, target, source),
        };

        metrics::record_decision(&decision);
        decision
    }

    /// Run the state machine on a skipped request for its session writes.
    ///
    /// The would-be target is never rendered and the country is not stored.
    fn remember_while_skipping<S>(&self, table: &RoutingTable, ctx: &RequestContext, session: &mut S)
    where
        S: SessionMemory + ?Sized,
    {
        let (would_be, source) = self.evaluate(table, ctx, session, Evaluation::RememberOnly);
        tracing::debug!(
            target_host = would_be.as_ref().map(|t| t.hostname.as_str()),
            source = source.as_str(),
            "Remembered decision for skipped request"
        );
    }

    fn evaluate<S>(
        &self,
        table: &RoutingTable,
        ctx: &RequestContext,
        session: &mut S,
        mode: Evaluation,
    ) -> (Option<Target>, DecisionSource)
    where
        S: SessionMemory + ?Sized,
    {
        if ctx.has_query_key(&self.force_key) {
            let key = table.resolve_by_hostname(ctx.host());
            tracing::debug!(host_key = %key, "Handling force flag");
            remember(session, RememberedHost::Key(key));
            let target = Target {
                hostname: ctx.host().to_string(),
                rewrite_origin_host: true,
            };
            return (Some(target), DecisionSource::Force);
        }

        if let Some(remembered) = session.remembered_host() {
            match remembered.resolve(table) {
                Some(hostname) => {
                    tracing::debug!(remembered = %remembered, "Handling session var");
                    let target = Target {
                        hostname: hostname.to_string(),
                        rewrite_origin_host: false,
                    };
                    return (Some(target), DecisionSource::Session);
                }
                None => {
                    tracing::debug!(remembered = %remembered, "Invalid session var, forgetting");
                    session.set_remembered_host(None);
                    metrics::record_session_forgotten();
                }
            }
        }

        let Some(country) = self.country_for(ctx, mode) else {
            return (None, DecisionSource::NoMatch);
        };

        let key = table.resolve_by_country(&country);
        tracing::debug!(country = %country, host_key = %key, "GeoIP host match");
        let hostname = table
            .hostname(&key)
            .unwrap_or(table.default_entry().hostname.as_str())
            .to_string();

        remember(session, RememberedHost::Key(key));
        if mode == Evaluation::Decide {
            session.set_remembered_country(Some(country));
        }

        let target = Target {
            hostname,
            rewrite_origin_host: false,
        };
        (Some(target), DecisionSource::GeoIp)
    }

    /// Look up the client's country. Every failure is "no country".
    fn country_for(&self, ctx: &RequestContext, mode: Evaluation) -> Option<CountryCode> {
        let raw = ctx.client_ip()?;
        tracing::debug!(ip = raw, "Handling GeoIP lookup");

        let result = raw
            .parse::<IpAddr>()
            .map_err(|_| LookupError::InvalidAddress(raw.to_string()))
            .and_then(|ip| self.geo.lookup(ip));

        match result {
            Ok(record) => {
                let country = record.country_code();
                tracing::debug!(ip = raw, country = ?country, "GeoIP match");
                country
            }
            Err(e) => {
                tracing::debug!(ip = raw, error = %e, "GeoIP lookup failed");
                if mode == Evaluation::Decide {
                    metrics::record_lookup_failure(e.reason());
                }
                None
            }
        }
    }

    fn render(&self, ctx: &RequestContext, target: Target, source: DecisionSource) -> Decision {
        if !should_redirect(ctx.host(), Some(&target.hostname), target.rewrite_origin_host) {
            tracing::debug!(host = ctx.host(), target = %target.hostname, "Already on target host");
            return Decision::pass(source);
        }

        match self.rewriter.rewrite(ctx.url(), Some(&target.hostname)) {
            Ok(location) => {
                tracing::debug!(location = %location, "Redirecting");
                Decision {
                    outcome: Outcome::RedirectTo {
                        hostname: target.hostname,
                        rewrite_origin_host: target.rewrite_origin_host,
                        location,
                    },
                    source,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build redirect URL, passing through");
                Decision::pass(source)
            }
        }
    }
}

fn remember<S>(session: &mut S, host: RememberedHost)
where
    S: SessionMemory + ?Sized,
{
    tracing::debug!(remembered = %host, "Remembering");
    session.set_remembered_host(Some(host));
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("routing_entries", &self.routing.load().len())
            .field("gate", &self.gate)
            .field("force_key", &self.force_key)
            .field("remember_when_skipping", &self.remember_when_skipping)
            .finish()
    }
}
