//! Validation run of one trust anchor
//!
//! Bootstraps the trust anchor certificate, prefetches the configured
//! repositories, walks the tree and evicts cache entries the run did not
//! refresh. Errors and panics inside a run become
//! [`ProcessFailure::Failed`].

use crate::bootstrap::extract_trust_anchor;
use crate::error::{ProcessFailure, ProcessResult};
use crate::model::{ValidatedObject, ValidationCheck, ValidationOptions};
use crate::walker::{TopDownWalker, TrustContext, WalkRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config_engine::TrustAnchorLocator;
use error_common::codes::trust_anchor;
use error_common::ValidatorError;
use futures::FutureExt;
use object_cache::ObjectCache;
use repo_fetcher::RepoService;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// The operation every layer of the pipeline implements
#[async_trait]
pub trait ValidationProcess: Send + Sync {
    fn trust_anchor(&self) -> &str;

    async fn run_process(&self, force_new_fetch: bool) -> ProcessResult<Vec<ValidatedObject>>;
}

/// Callbacks the base process invokes at fixed points of a run, in
/// registration order
pub trait ProcessHooks: Send + Sync {
    /// The certificate-tree walk is about to start
    fn walk_started(&self, _trust_anchor: &str) {}

    /// The run hit an unexpected error, before it is turned into a failure
    fn failed(&self, _trust_anchor: &str, _error: &ValidatorError) {}

    /// Runs on every exit path
    fn finished(&self, _trust_anchor: &str) {}
}

pub struct TrustAnchorValidationProcess {
    locator: Arc<TrustAnchorLocator>,
    fetcher: Arc<dyn RepoService>,
    cache: Arc<dyn ObjectCache>,
    walker: Arc<dyn TopDownWalker>,
    options: ValidationOptions,
    hooks: Vec<Arc<dyn ProcessHooks>>,
}

impl TrustAnchorValidationProcess {
    pub fn new(
        locator: Arc<TrustAnchorLocator>,
        fetcher: Arc<dyn RepoService>,
        cache: Arc<dyn ObjectCache>,
        walker: Arc<dyn TopDownWalker>,
        options: ValidationOptions,
    ) -> Self {
        Self {
            locator,
            fetcher,
            cache,
            walker,
            options,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ProcessHooks>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    async fn run(&self, force_new_fetch: bool, started_at: DateTime<Utc>) -> Result<Vec<ValidatedObject>, ValidatorError> {
        let anchor =
            extract_trust_anchor(&self.locator, self.fetcher.as_ref(), self.cache.as_ref(), force_new_fetch).await?;

        let Some(context) = TrustContext::from_validated(&self.locator.name, &anchor) else {
            return Ok(vec![anchor]);
        };

        if !context.certificate.is_resource_certificate() {
            tracing::error!(
                trust_anchor = %self.locator.name,
                uri = %context.location,
                "Trust anchor certificate carries no resource extensions"
            );
            let mut checks = anchor.checks().to_vec();
            checks.push(ValidationCheck::error(
                context.location.as_str(),
                trust_anchor::NOT_RESOURCE_CERTIFICATE,
                Vec::new(),
            ));
            return Ok(vec![ValidatedObject::Invalid {
                uri: context.location,
                checks,
            }]);
        }

        let mut objects = self.validate_objects(context, force_new_fetch, started_at).await?;
        objects.push(anchor);
        Ok(objects)
    }

    async fn validate_objects(
        &self,
        context: TrustContext,
        force_new_fetch: bool,
        started_at: DateTime<Utc>,
    ) -> Result<Vec<ValidatedObject>, ValidatorError> {
        for uri in &self.locator.prefetch_uris {
            let errors = self.fetcher.visit_repo(force_new_fetch, started_at, uri).await;
            for error in errors {
                tracing::debug!(trust_anchor = %self.locator.name, error = %error, "Prefetch error");
            }
        }

        for hook in &self.hooks {
            hook.walk_started(&self.locator.name);
        }

        let request = WalkRequest {
            context,
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options,
            started_at,
            prefer_rrdp: self.options.prefer_rrdp,
            force_new_fetch,
        };
        let walked = self.walker.walk(request).await;

        // eviction runs even when the walk failed
        let evicted = self.cache.clear_objects(&self.locator.name, started_at).await;
        let objects = walked?;
        let evicted = evicted?;

        tracing::debug!(
            trust_anchor = %self.locator.name,
            objects = objects.len(),
            evicted,
            "Certificate tree validated"
        );
        Ok(objects)
    }

    fn handle_error(&self, error: &ValidatorError) -> ProcessFailure {
        for hook in &self.hooks {
            hook.failed(&self.locator.name, error);
        }
        ProcessFailure::Failed(error.message())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "validation run panicked".to_string())
}

#[async_trait]
impl ValidationProcess for TrustAnchorValidationProcess {
    fn trust_anchor(&self) -> &str {
        &self.locator.name
    }

    async fn run_process(&self, force_new_fetch: bool) -> ProcessResult<Vec<ValidatedObject>> {
        let started_at = Utc::now();

        let result = match AssertUnwindSafe(self.run(force_new_fetch, started_at))
            .catch_unwind()
            .await
        {
            Ok(Ok(objects)) => Ok(objects),
            Ok(Err(error)) => Err(self.handle_error(&error)),
            Err(payload) => {
                let error = ValidatorError::InternalError(panic_message(payload.as_ref()));
                Err(self.handle_error(&error))
            }
        };

        for hook in &self.hooks {
            hook.finished(&self.locator.name);
        }
        result
    }
}
