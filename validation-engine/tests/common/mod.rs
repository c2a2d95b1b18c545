#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use config_engine::TrustAnchorLocator;
use error_common::ValidatorError;
use object_cache::{CertificateObject, DecodedCertificate, InMemoryObjectCache, ObjectCache};
use parking_lot::Mutex;
use repo_fetcher::{FetchError, FetchResult, RepoService, UriGuard, UriLocks};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;
use validation_engine::{
    compose, ProcessParts, TopDownWalker, TrustAnchorStates, ValidatedObject, ValidationOptions,
    ValidationProcess, WalkRequest,
};

pub const TA_URI: &str = "rsync://rpki.example.net/ta/ta.cer";
pub const TA_HTTPS_URI: &str = "https://rpki.example.net/ta/ta.cer";

pub fn key_pair() -> rcgen::KeyPair {
    rcgen::KeyPair::generate().unwrap()
}

/// Self-signed CA certificate, with an RFC 3779 IP resource extension when
/// `resources` is set
pub fn certificate(key: &rcgen::KeyPair, serial: u8, resources: bool) -> Vec<u8> {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params.serial_number = Some(rcgen::SerialNumber::from_slice(&[serial]));
    if resources {
        params.custom_extensions.push(rcgen::CustomExtension::from_oid_content(
            &[1, 3, 6, 1, 5, 5, 7, 1, 7],
            vec![0x30, 0x08, 0x30, 0x06, 0x04, 0x02, 0x00, 0x01, 0x05, 0x00],
        ));
    }
    params.self_signed(key).unwrap().der().to_vec()
}

pub fn public_key_info(der: &[u8]) -> Vec<u8> {
    DecodedCertificate::from_der(der).unwrap().subject_public_key_info
}

pub fn locator(locations: &[&str], public_key_info: Vec<u8>) -> Arc<TrustAnchorLocator> {
    named_locator("test-ta", locations, public_key_info)
}

pub fn named_locator(name: &str, locations: &[&str], public_key_info: Vec<u8>) -> Arc<TrustAnchorLocator> {
    let locations = locations.iter().map(|uri| Url::parse(uri).unwrap()).collect();
    Arc::new(TrustAnchorLocator::new(name, locations, public_key_info))
}

/// Fetcher answering from per-URI queues. The last queued answer for a URI
/// repeats forever.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, String>>>>,
    calls: AtomicUsize,
    prefetched: Mutex<Vec<String>>,
    locks: UriLocks,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, uri: &str, response: Result<Vec<u8>, &str>) {
        self.responses
            .lock()
            .entry(uri.to_string())
            .or_default()
            .push_back(response.map_err(str::to_string));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prefetched(&self) -> Vec<String> {
        self.prefetched.lock().clone()
    }

    fn next_response(&self, uri: &str) -> Option<Result<Vec<u8>, String>> {
        let mut responses = self.responses.lock();
        let queue = responses.get_mut(uri)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl RepoService for ScriptedFetcher {
    async fn visit_trust_anchor_certificate(
        &self,
        uri: &Url,
        _force_new_fetch: bool,
    ) -> Result<CertificateObject, Vec<FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_response(uri.as_str()) {
            Some(Ok(encoded)) => CertificateObject::parse(uri.as_str(), encoded, Utc::now())
                .map_err(|e| vec![FetchError::new(uri.as_str(), e.to_string())]),
            Some(Err(message)) => Err(vec![FetchError::new(uri.as_str(), message)]),
            None => Err(vec![FetchError::new(uri.as_str(), "no scripted response")]),
        }
    }

    async fn visit_repo(&self, _force_new_fetch: bool, _started_at: chrono::DateTime<Utc>, uri: &Url) -> Vec<FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prefetched.lock().push(uri.to_string());
        Vec::new()
    }

    async fn fetch_object(&self, uri: &Url) -> FetchResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::new(uri.as_str(), "not scripted"))
    }

    async fn lock(&self, uri: &str) -> UriGuard {
        self.locks.lock(uri).await
    }
}

/// Returns fixed objects and refreshes the given cache hashes
#[derive(Default)]
pub struct StaticWalker {
    pub objects: Vec<ValidatedObject>,
    pub refresh: Vec<String>,
    pub calls: AtomicUsize,
    /// Prefetched URIs seen by the fetcher when the walk started
    pub prefetched_at_walk: Mutex<Option<Vec<String>>>,
    pub fetcher: Option<Arc<ScriptedFetcher>>,
}

#[async_trait]
impl TopDownWalker for StaticWalker {
    async fn walk(&self, request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fetcher) = &self.fetcher {
            *self.prefetched_at_walk.lock() = Some(fetcher.prefetched());
        }
        request
            .cache
            .update_validation_timestamp(&request.context.trust_anchor, &self.refresh, request.started_at)
            .await?;
        Ok(self.objects.clone())
    }
}

pub struct FailingWalker;

#[async_trait]
impl TopDownWalker for FailingWalker {
    async fn walk(&self, _request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError> {
        Err(ValidatorError::WalkerError("manifest unreachable".to_string()))
    }
}

pub struct PanickingWalker;

#[async_trait]
impl TopDownWalker for PanickingWalker {
    async fn walk(&self, _request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError> {
        panic!("walker exploded");
    }
}

/// Parks inside the walk until released
#[derive(Default)]
pub struct BlockingWalker {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl TopDownWalker for BlockingWalker {
    async fn walk(&self, _request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub cache: Arc<InMemoryObjectCache>,
    pub states: Arc<TrustAnchorStates>,
    pub process: Arc<dyn ValidationProcess>,
}

pub fn harness(
    locator: Arc<TrustAnchorLocator>,
    fetcher: Arc<ScriptedFetcher>,
    walker: Arc<dyn TopDownWalker>,
) -> Harness {
    let cache = Arc::new(InMemoryObjectCache::new());
    let states = Arc::new(TrustAnchorStates::new(chrono::Duration::minutes(10)));
    let process = compose(
        ProcessParts {
            locator,
            fetcher: fetcher.clone(),
            cache: cache.clone(),
            walker,
            options: ValidationOptions::default(),
        },
        states.clone(),
    );
    Harness {
        fetcher,
        cache,
        states,
        process,
    }
}

pub async fn cached_at(cache: &dyn ObjectCache, uri: &str) -> usize {
    cache.objects_at(uri).await.unwrap().len()
}
