//! Observability for the RPKI validator
//!
//! - Structured logging through `tracing` with an `EnvFilter`
//! - Pretty console output for operators, JSON lines for log shippers
//! - Run, fetch and object metrics via the `metrics` facade
//! - Optional Prometheus scrape endpoint

pub mod logging;
pub mod metrics;
pub mod error;

pub use logging::*;
pub use error::*;
