//! Metrics collection and exposition.
//!
//! # Metrics
//! - `herald_samples_total` (counter): sampling cycles by plugin, outcome
//! - `herald_sample_duration_seconds` (histogram): time spent in one cycle
//! - `herald_responses_total` (counter): tokens sent by plugin, stale
//! - `herald_active_connections` (gauge): open agent-check connections
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - The exporter runs its own HTTP listener, separate from the agent port

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Outcome label for a sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Ok,
    SourceError,
    RuleError,
}

impl SampleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleOutcome::Ok => "ok",
            SampleOutcome::SourceError => "source_error",
            SampleOutcome::RuleError => "rule_error",
        }
    }
}

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_sample(plugin: &str, outcome: SampleOutcome, started: Instant) {
    counter!(
        "herald_samples_total",
        "plugin" => plugin.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("herald_sample_duration_seconds", "plugin" => plugin.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_response(plugin: &str, stale: bool) {
    counter!(
        "herald_responses_total",
        "plugin" => plugin.to_string(),
        "stale" => if stale { "true" } else { "false" }
    )
    .increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("herald_active_connections").set(count as f64);
}
