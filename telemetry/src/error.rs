use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Tracing initialization failed: {0}")]
    TracingError(String),

    #[error("Invalid log filter: {0}")]
    FilterError(String),

    #[error("Exporter error: {0}")]
    ExporterError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
