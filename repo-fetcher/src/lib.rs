//! Repository fetch service for the RPKI validator
//!
//! Provides:
//! - The [`RepoService`] contract used by validation runs
//! - rsync, HTTPS and RRDP transports
//! - Per-URI locking shared across trust anchors
//! - An in-process mirror of fetched repository content
//! - Fetch listeners for logging and metrics

pub mod error;
pub mod listener;
pub mod locks;
pub mod mirror;
pub mod service;
pub mod transport;

pub use error::{FetchError, FetchResult};
pub use listener::{FetchListener, LoggingFetchListener};
pub use locks::{UriGuard, UriLocks};
pub use mirror::{MirroredObject, RepositoryMirror};
pub use service::{FetchService, RepoService};
