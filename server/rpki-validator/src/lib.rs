//! RPKI validator daemon
//!
//! Wires configuration, the object cache, repository fetchers and one
//! composed validation process per trust anchor into a scheduler.

pub mod app;
pub mod summary;

pub use app::Validator;
pub use summary::{RunSummary, TrustAnchorSummary};
