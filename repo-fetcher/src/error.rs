//! Fetch error type

use thiserror::Error;

/// Failure to retrieve one URI, carried back to the caller rather than
/// aborting the run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{uri}: {message}")]
pub struct FetchError {
    pub uri: String,
    pub message: String,
}

impl FetchError {
    pub fn new(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

impl From<FetchError> for error_common::ValidatorError {
    fn from(err: FetchError) -> Self {
        error_common::ValidatorError::FetchError(err.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
