//! Repository fetch service
//!
//! Routes fetches to a transport by URI scheme, keeps a mirror of fetched
//! content and notifies attached listeners of every outcome.

use crate::error::{FetchError, FetchResult};
use crate::listener::FetchListener;
use crate::locks::{UriGuard, UriLocks};
use crate::mirror::{MirroredObject, RepositoryMirror};
use crate::transport::{HttpsTransport, RrdpTransport, RsyncTransport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use config_engine::FetchSettings;
use object_cache::CertificateObject;
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// Fetch contract consumed by the validation process and the walker
#[async_trait]
pub trait RepoService: Send + Sync {
    /// Fetch and decode a trust anchor certificate. The caller holds
    /// [`lock`](RepoService::lock) for `uri` around this call.
    async fn visit_trust_anchor_certificate(
        &self,
        uri: &Url,
        force_new_fetch: bool,
    ) -> Result<CertificateObject, Vec<FetchError>>;

    /// Bring a whole repository into the mirror. Skipped when the
    /// repository was already visited at or after `started_at`, unless
    /// `force_new_fetch` is set.
    async fn visit_repo(&self, force_new_fetch: bool, started_at: DateTime<Utc>, uri: &Url) -> Vec<FetchError>;

    /// Fetch a single object over the network
    async fn fetch_object(&self, uri: &Url) -> FetchResult<Vec<u8>>;

    /// Exclusive access to one URI
    async fn lock(&self, uri: &str) -> UriGuard;

    /// Content already brought in by an earlier visit or fetch
    fn mirrored(&self, _uri: &str) -> Option<MirroredObject> {
        None
    }

    fn add_listener(&self, _listener: Arc<dyn FetchListener>) {}
}

pub struct FetchService {
    rsync: RsyncTransport,
    https: HttpsTransport,
    rrdp: RrdpTransport,
    locks: UriLocks,
    mirror: Arc<RepositoryMirror>,
    listeners: RwLock<Vec<Arc<dyn FetchListener>>>,
    reuse_window: Duration,
}

impl FetchService {
    /// Locks and mirror may be shared with the services of other trust
    /// anchors.
    pub fn new(rsync: RsyncTransport, https: HttpsTransport, locks: UriLocks, mirror: Arc<RepositoryMirror>) -> Self {
        Self {
            rsync,
            rrdp: RrdpTransport::new(https.clone()),
            https,
            locks,
            mirror,
            listeners: RwLock::new(Vec::new()),
            reuse_window: Duration::zero(),
        }
    }

    pub fn from_settings(settings: &FetchSettings, locks: UriLocks, mirror: Arc<RepositoryMirror>) -> FetchResult<Self> {
        let rsync = RsyncTransport::new(
            settings.rsync_binary.clone(),
            settings.mirror_directory.clone(),
            std::time::Duration::from_secs(settings.rsync_timeout_secs),
        );
        let https = HttpsTransport::new(std::time::Duration::from_secs(settings.http_timeout_secs))?;
        Ok(Self::new(rsync, https, locks, mirror))
    }

    /// Let non-forced trust anchor visits reuse a mirrored copy younger
    /// than `window`. The default window is zero, so every visit fetches.
    pub fn with_reuse_window(mut self, window: Duration) -> Self {
        self.reuse_window = window;
        self
    }

    pub fn mirror(&self) -> &Arc<RepositoryMirror> {
        &self.mirror
    }

    fn notify(&self, event: impl Fn(&dyn FetchListener)) {
        for listener in self.listeners.read().iter() {
            event(listener.as_ref());
        }
    }

    async fn retrieve(&self, uri: &Url) -> FetchResult<Vec<u8>> {
        match uri.scheme() {
            "rsync" => self.rsync.fetch_file(uri).await,
            "http" | "https" => self.https.get(uri).await,
            other => Err(FetchError::new(uri.as_str(), format!("unsupported scheme {}", other))),
        }
    }

    fn reusable(&self, uri: &Url) -> Option<MirroredObject> {
        let mirrored = self.mirror.get(uri.as_str())?;
        (Utc::now() - mirrored.fetched_at < self.reuse_window).then_some(mirrored)
    }
}

#[async_trait]
impl RepoService for FetchService {
    async fn visit_trust_anchor_certificate(
        &self,
        uri: &Url,
        force_new_fetch: bool,
    ) -> Result<CertificateObject, Vec<FetchError>> {
        let (encoded, fetched_at) = match self.reusable(uri).filter(|_| !force_new_fetch) {
            Some(mirrored) => {
                tracing::debug!(uri = %uri, "Reusing mirrored trust anchor certificate");
                (mirrored.encoded, mirrored.fetched_at)
            }
            None => {
                let fetched_at = Utc::now();
                match self.retrieve(uri).await {
                    Ok(encoded) => {
                        self.mirror.insert(uri.as_str(), encoded.clone(), fetched_at);
                        self.notify(|l| l.fetch_succeeded(uri.as_str()));
                        (encoded, fetched_at)
                    }
                    Err(error) => {
                        self.notify(|l| l.fetch_failed(&error));
                        return Err(vec![error]);
                    }
                }
            }
        };

        CertificateObject::parse(uri.as_str(), encoded, fetched_at).map_err(|e| {
            let error = FetchError::new(uri.as_str(), e.to_string());
            self.notify(|l| l.fetch_failed(&error));
            vec![error]
        })
    }

    async fn visit_repo(&self, force_new_fetch: bool, started_at: DateTime<Utc>, uri: &Url) -> Vec<FetchError> {
        let _guard = self.locks.lock(uri.as_str()).await;

        if !force_new_fetch && self.mirror.visited_since(uri.as_str(), started_at) {
            tracing::debug!(uri = %uri, "Repository already visited in this run");
            return Vec::new();
        }

        let fetched_at = Utc::now();
        let result = match uri.scheme() {
            "rsync" => self
                .rsync
                .fetch_directory(uri)
                .await
                .map(|objects| self.mirror.replace_repository(uri.as_str(), objects, fetched_at)),
            "http" | "https" => self.rrdp.fetch_snapshot(uri).await.map(|snapshot| {
                for (object_uri, encoded) in snapshot.objects {
                    self.mirror.insert(object_uri, encoded, fetched_at);
                }
            }),
            other => Err(FetchError::new(uri.as_str(), format!("unsupported scheme {}", other))),
        };

        match result {
            Ok(()) => {
                self.mirror.record_visit(uri.as_str(), fetched_at);
                self.notify(|l| l.prefetch_succeeded(uri.as_str()));
                Vec::new()
            }
            Err(error) => {
                self.notify(|l| l.prefetch_failed(&error));
                vec![error]
            }
        }
    }

    async fn fetch_object(&self, uri: &Url) -> FetchResult<Vec<u8>> {
        let _guard = self.locks.lock(uri.as_str()).await;

        let fetched_at = Utc::now();
        match self.retrieve(uri).await {
            Ok(encoded) => {
                self.mirror.insert(uri.as_str(), encoded.clone(), fetched_at);
                self.notify(|l| l.fetch_succeeded(uri.as_str()));
                Ok(encoded)
            }
            Err(error) => {
                self.notify(|l| l.fetch_failed(&error));
                Err(error)
            }
        }
    }

    async fn lock(&self, uri: &str) -> UriGuard {
        self.locks.lock(uri).await
    }

    fn mirrored(&self, uri: &str) -> Option<MirroredObject> {
        self.mirror.get(uri)
    }

    fn add_listener(&self, listener: Arc<dyn FetchListener>) {
        self.listeners.write().push(listener);
    }
}
