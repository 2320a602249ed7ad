//! Launcher metrics.
//!
//! # Metrics
//! - `launcher_lifecycle_transitions_total` (counter): state changes by unit, state
//! - `launcher_redeploys_total` (counter): redeploys by unit, outcome
//! - `launcher_redeploy_duration_seconds` (histogram): time from dispose to started
//! - `launcher_drains_total` (counter): runtime drains by unit, outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exposition only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::shutdown::DrainOutcome;
use crate::lifecycle::state::UnitState;

const REDEPLOY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(REDEPLOY_BUCKETS)?
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_transition(unit: &str, state: UnitState) {
    counter!(
        "launcher_lifecycle_transitions_total",
        "unit" => unit.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

pub fn record_redeploy(unit: &str, success: bool, started: Instant) {
    let outcome = if success { "success" } else { "failure" };
    counter!("launcher_redeploys_total", "unit" => unit.to_string(), "outcome" => outcome).increment(1);
    histogram!("launcher_redeploy_duration_seconds", "unit" => unit.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_drain(unit: &str, outcome: &DrainOutcome) {
    let outcome = match outcome {
        DrainOutcome::Drained => "drained",
        DrainOutcome::Abandoned { .. } => "abandoned",
    };
    counter!("launcher_drains_total", "unit" => unit.to_string(), "outcome" => outcome).increment(1);
}
