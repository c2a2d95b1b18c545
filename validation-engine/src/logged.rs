//! Logging and metrics layer

use crate::error::{ProcessFailure, ProcessResult};
use crate::model::ValidatedObject;
use crate::process::{ProcessHooks, ValidationProcess};
use async_trait::async_trait;
use error_common::ValidatorError;
use repo_fetcher::{LoggingFetchListener, RepoService};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics::{record_validated_objects, record_validation_run, RunLabel};
use tracing::Instrument;
use uuid::Uuid;

/// Logs unexpected errors before the base process converts them
pub struct LoggingHooks;

impl ProcessHooks for LoggingHooks {
    fn failed(&self, trust_anchor: &str, error: &ValidatorError) {
        error_common::log_error(trust_anchor, error);
    }

    fn finished(&self, trust_anchor: &str) {
        tracing::trace!(trust_anchor = trust_anchor, "Validation run finalized");
    }
}

pub struct LoggedProcess<P> {
    inner: P,
}

impl<P: ValidationProcess> LoggedProcess<P> {
    /// Attaches a logging listener to `fetcher` for this trust anchor
    pub fn new(inner: P, fetcher: &dyn RepoService) -> Self {
        fetcher.add_listener(Arc::new(LoggingFetchListener::new(inner.trust_anchor())));
        Self { inner }
    }
}

#[async_trait]
impl<P: ValidationProcess> ValidationProcess for LoggedProcess<P> {
    fn trust_anchor(&self) -> &str {
        self.inner.trust_anchor()
    }

    async fn run_process(&self, force_new_fetch: bool) -> ProcessResult<Vec<ValidatedObject>> {
        let name = self.inner.trust_anchor();
        let span = tracing::info_span!("validation_run", trust_anchor = name, run_id = %Uuid::new_v4());

        async move {
            tracing::info!(force_new_fetch, "Validation started");
            let started = Instant::now();

            let result = self.inner.run_process(force_new_fetch).await;
            let elapsed = started.elapsed();

            match &result {
                Ok(objects) => {
                    let valid = objects.iter().filter(|o| o.is_valid()).count();
                    let invalid = objects.len() - valid;
                    tracing::info!(valid, invalid, elapsed = ?elapsed, "Validation finished");
                    record_validation_run(name, RunLabel::Success, elapsed);
                    record_validated_objects(name, valid, invalid);
                }
                Err(ProcessFailure::NotIdle) => {
                    tracing::info!("Validation skipped, trust anchor busy or disabled");
                    record_validation_run(name, RunLabel::Rejected, elapsed);
                }
                Err(ProcessFailure::Failed(message)) => {
                    tracing::error!(error = %message, elapsed = ?elapsed, "Validation failed");
                    record_validation_run(name, RunLabel::Failure, elapsed);
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
