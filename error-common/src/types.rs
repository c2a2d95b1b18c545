use thiserror::Error;

/// Error enum shared by the validator crates
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Repository fetch errors
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// Object cache errors
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Certificate decoding errors
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Certificate-tree walk errors
    #[error("Walker error: {0}")]
    WalkerError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ValidatorError {
    /// The bare message carried by the error, falling back to the full
    /// display form when the variant carries no message of its own.
    pub fn message(&self) -> String {
        let message = match self {
            ValidatorError::FetchError(m)
            | ValidatorError::CacheError(m)
            | ValidatorError::CertificateError(m)
            | ValidatorError::WalkerError(m)
            | ValidatorError::ConfigError(m)
            | ValidatorError::InternalError(m) => m.clone(),
            ValidatorError::Other(e) => e.to_string(),
        };

        if message.trim().is_empty() {
            self.to_string()
        } else {
            message
        }
    }

    /// Short machine-readable category, used as a log and metric label
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidatorError::FetchError(_) => "fetch",
            ValidatorError::CacheError(_) => "cache",
            ValidatorError::CertificateError(_) => "certificate",
            ValidatorError::WalkerError(_) => "walker",
            ValidatorError::ConfigError(_) => "config",
            ValidatorError::InternalError(_) => "internal",
            ValidatorError::Other(_) => "other",
        }
    }
}

/// Result type alias for validator operations
pub type Result<T> = std::result::Result<T, ValidatorError>;

/// Logging helper for errors surfaced at a process boundary
pub fn log_error(context: &str, error: &ValidatorError) {
    tracing::error!(
        context = context,
        error_type = error.error_type(),
        error = %error,
        "Validator error occurred"
    );
}
