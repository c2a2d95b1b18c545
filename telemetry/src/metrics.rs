//! Metric names and recorders
//!
//! Recording is a no-op until a recorder is installed, so library code can
//! call these unconditionally.

use crate::error::{Result, TelemetryError};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

pub const VALIDATION_RUNS_TOTAL: &str = "rpki_validation_runs_total";
pub const VALIDATION_DURATION_SECONDS: &str = "rpki_validation_duration_seconds";
pub const VALIDATED_OBJECTS: &str = "rpki_validated_objects";
pub const FETCH_FAILURES_TOTAL: &str = "rpki_fetch_failures_total";
pub const FETCHES_TOTAL: &str = "rpki_fetches_total";

/// Outcome label of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLabel {
    Success,
    Failure,
    Rejected,
}

impl RunLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunLabel::Success => "success",
            RunLabel::Failure => "failure",
            RunLabel::Rejected => "rejected",
        }
    }
}

pub fn record_validation_run(trust_anchor: &str, outcome: RunLabel, elapsed: Duration) {
    ::metrics::counter!(
        VALIDATION_RUNS_TOTAL,
        "trust_anchor" => trust_anchor.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    ::metrics::histogram!(VALIDATION_DURATION_SECONDS, "trust_anchor" => trust_anchor.to_string())
        .record(elapsed.as_secs_f64());
}

#[allow(clippy::cast_precision_loss)]
pub fn record_validated_objects(trust_anchor: &str, valid: usize, invalid: usize) {
    ::metrics::gauge!(VALIDATED_OBJECTS, "trust_anchor" => trust_anchor.to_string(), "status" => "valid")
        .set(valid as f64);
    ::metrics::gauge!(VALIDATED_OBJECTS, "trust_anchor" => trust_anchor.to_string(), "status" => "invalid")
        .set(invalid as f64);
}

pub fn record_fetch(kind: &'static str, success: bool) {
    ::metrics::counter!(FETCHES_TOTAL, "kind" => kind).increment(1);
    if !success {
        ::metrics::counter!(FETCH_FAILURES_TOTAL, "kind" => kind).increment(1);
    }
}

/// Install the Prometheus exporter with an HTTP scrape endpoint.
/// Must be called from within a tokio runtime.
pub fn install_prometheus(listen_address: &str) -> Result<()> {
    let addr: SocketAddr = listen_address
        .parse()
        .map_err(|e| TelemetryError::ExporterError(format!("{}: {}", listen_address, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::ExporterError(e.to_string()))?;

    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}
