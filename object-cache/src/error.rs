//! Error types for the object cache

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

impl From<CacheError> for error_common::ValidatorError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidObject(message) => error_common::ValidatorError::CertificateError(message),
            other => error_common::ValidatorError::CacheError(other.to_string()),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
