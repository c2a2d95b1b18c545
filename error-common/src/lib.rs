//! Common error handling utilities for the RPKI validator
//!
//! Provides the error enum every validator crate converts into, and the
//! stable check keys recorded on validated objects.
//!
//! # Error Categories
//!
//! - **FetchError**: rsync, HTTPS and RRDP transport failures
//! - **CacheError**: object cache persistence failures
//! - **CertificateError**: certificates that cannot be decoded
//! - **WalkerError**: failures raised by the certificate-tree walker
//! - **ConfigError**: invalid configuration or trust anchor locators
//! - **InternalError**: everything else
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ValidatorError};
//!
//! fn require_uri(uri: &str) -> error_common::Result<&str> {
//!     if uri.is_empty() {
//!         return Err(ValidatorError::ConfigError("empty certificate URI".to_string()));
//!     }
//!     Ok(uri)
//! }
//!
//! assert!(require_uri("").is_err());
//! assert_eq!(codes::trust_anchor::PUBLIC_KEY_MATCH, "TRUST_ANCHOR_PUBLIC_KEY_MATCH");
//! ```

pub mod types;
pub mod codes;

pub use types::*;
