//! Validated repository object cache
//!
//! Objects are keyed by content hash and addressable by location. Two
//! backends implement the same [`ObjectCache`] contract:
//! - [`InMemoryObjectCache`] for tests and short-lived runs
//! - [`SqliteObjectCache`] for persistence across restarts

pub mod cache;
pub mod error;
pub mod memory;
pub mod object;
pub mod sqlite;

pub use cache::ObjectCache;
pub use error::{CacheError, CacheResult};
pub use memory::InMemoryObjectCache;
pub use object::{content_hash, CachedObject, CertificateObject, DecodedCertificate, ObjectKind};
pub use sqlite::{SqliteCacheConfig, SqliteObjectCache};
