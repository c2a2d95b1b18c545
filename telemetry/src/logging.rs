//! Tracing subscriber setup

use crate::error::{Result, TelemetryError};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events are shown at the configured level
const VALIDATOR_TARGETS: &[&str] = &[
    "rpki_validator",
    "validation_engine",
    "repo_fetcher",
    "object_cache",
    "config_engine",
];

/// Build the default filter directive for `level`, quietening the noisier
/// dependencies.
pub fn default_filter(level: &str) -> String {
    let mut directives: Vec<String> = VALIDATOR_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push("sqlx=warn".to_string());
    directives.push("reqwest=info".to_string());
    directives.push("hyper=info".to_string());
    directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Human-readable output is used unless `json` is set, in which case every
/// event is written as one JSON object per line.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(level))
            .map_err(|e| TelemetryError::FilterError(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::TracingError(e.to_string()))
}
