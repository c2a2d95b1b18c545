//! Certificate-tree walker contract

use crate::model::{ValidatedObject, ValidationOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_common::ValidatorError;
use object_cache::{DecodedCertificate, ObjectCache};
use repo_fetcher::RepoService;
use std::sync::Arc;

/// Starting point of a walk: the accepted trust anchor certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustContext {
    pub trust_anchor: String,
    pub location: String,
    pub hash: String,
    pub certificate: DecodedCertificate,
}

impl TrustContext {
    /// Build from a valid trust anchor object carrying its certificate
    pub fn from_validated(trust_anchor: &str, object: &ValidatedObject) -> Option<Self> {
        match object {
            ValidatedObject::Valid {
                uri,
                hash,
                certificate: Some(certificate),
                ..
            } => Some(Self {
                trust_anchor: trust_anchor.to_string(),
                location: uri.clone(),
                hash: hash.clone(),
                certificate: certificate.clone(),
            }),
            _ => None,
        }
    }
}

/// Everything a walk needs, handed over by the validation process
#[derive(Clone)]
pub struct WalkRequest {
    pub context: TrustContext,
    pub cache: Arc<dyn ObjectCache>,
    pub fetcher: Arc<dyn RepoService>,
    pub options: ValidationOptions,
    pub started_at: DateTime<Utc>,
    pub prefer_rrdp: bool,
    pub force_new_fetch: bool,
}

/// Recursive validation of everything reachable from a trust context.
///
/// Implementations fetch through the request's fetcher, store what they
/// accept in the cache, refresh validation timestamps of every object they
/// revisit and honor `max_stale_days` and `loose_validation_enabled`.
#[async_trait]
pub trait TopDownWalker: Send + Sync {
    async fn walk(&self, request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError>;
}

/// Walker that validates nothing below the trust anchor
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustAnchorOnlyWalker;

#[async_trait]
impl TopDownWalker for TrustAnchorOnlyWalker {
    async fn walk(&self, request: WalkRequest) -> Result<Vec<ValidatedObject>, ValidatorError> {
        tracing::debug!(
            trust_anchor = %request.context.trust_anchor,
            repository = ?request.context.certificate.repository_uri,
            notification = ?request.context.certificate.notification_uri,
            "Tree walk disabled, validating the trust anchor only"
        );
        Ok(Vec::new())
    }
}
