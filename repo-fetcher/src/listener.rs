//! Fetch event callbacks

use crate::error::FetchError;
use telemetry::metrics::record_fetch;

/// Observer of fetch outcomes. Callbacks run inline on the fetching task
/// and must not block.
pub trait FetchListener: Send + Sync {
    fn prefetch_succeeded(&self, _uri: &str) {}
    fn prefetch_failed(&self, _error: &FetchError) {}
    fn fetch_succeeded(&self, _uri: &str) {}
    fn fetch_failed(&self, _error: &FetchError) {}
}

/// Logs every fetch event and counts it in the fetch metrics
pub struct LoggingFetchListener {
    trust_anchor: String,
}

impl LoggingFetchListener {
    pub fn new(trust_anchor: impl Into<String>) -> Self {
        Self {
            trust_anchor: trust_anchor.into(),
        }
    }
}

impl FetchListener for LoggingFetchListener {
    fn prefetch_succeeded(&self, uri: &str) {
        tracing::info!(trust_anchor = %self.trust_anchor, uri = uri, "Prefetched repository");
        record_fetch("prefetch", true);
    }

    fn prefetch_failed(&self, error: &FetchError) {
        tracing::warn!(
            trust_anchor = %self.trust_anchor,
            uri = %error.uri,
            error = %error.message,
            "Repository prefetch failed"
        );
        record_fetch("prefetch", false);
    }

    fn fetch_succeeded(&self, uri: &str) {
        tracing::debug!(trust_anchor = %self.trust_anchor, uri = uri, "Fetched object");
        record_fetch("object", true);
    }

    fn fetch_failed(&self, error: &FetchError) {
        tracing::warn!(
            trust_anchor = %self.trust_anchor,
            uri = %error.uri,
            error = %error.message,
            "Object fetch failed"
        );
        record_fetch("object", false);
    }
}
