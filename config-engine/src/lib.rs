//! Configuration management for the RPKI validator
//!
//! This crate provides:
//! - Layered engine configuration (defaults, file, environment)
//! - Trust Anchor Locator parsing (RFC 8630 and the legacy property format)
//! - Validation of both before the engine starts
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::{TrustAnchorLocator, ValidatorConfig};
//!
//! let config = ValidatorConfig::load(None)?;
//! let locators = TrustAnchorLocator::load_directory(&config.tal_directory)?;
//! for tal in &locators {
//!     println!("{}: {} candidate locations", tal.name, tal.certificate_locations.len());
//! }
//! # Ok::<(), config_engine::ConfigError>(())
//! ```

pub mod settings;
pub mod tal;
pub mod error;

pub use settings::*;
pub use tal::TrustAnchorLocator;
pub use error::*;
