//! State-tracking layer
//!
//! Gates every run on [`TrustAnchorStates::try_claim`] and returns the trust
//! anchor to idle however the run ends, including when the run future is
//! dropped mid-flight.

use crate::error::{ProcessFailure, ProcessResult};
use crate::model::ValidatedObject;
use crate::process::{ProcessHooks, ValidationProcess};
use crate::state::{TrustAnchorStates, UPDATING_ROAS};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Publishes walk progress to the state tracker
pub struct StateHooks {
    states: Arc<TrustAnchorStates>,
}

impl StateHooks {
    pub fn new(states: Arc<TrustAnchorStates>) -> Self {
        Self { states }
    }
}

impl ProcessHooks for StateHooks {
    fn walk_started(&self, trust_anchor: &str) {
        self.states.mark_running(trust_anchor, UPDATING_ROAS);
    }
}

/// Releases a claimed trust anchor on drop unless the run completed
struct Claim<'a> {
    states: &'a TrustAnchorStates,
    name: &'a str,
    started: Instant,
    released: bool,
}

impl Claim<'_> {
    fn release(mut self, result: &ProcessResult<Vec<ValidatedObject>>) {
        self.states.complete(self.name, result, self.started.elapsed());
        self.released = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(trust_anchor = %self.name, "Validation run abandoned");
            self.states.complete(
                self.name,
                &Err(ProcessFailure::Failed("Validation run abandoned".to_string())),
                self.started.elapsed(),
            );
        }
    }
}

pub struct TrackedProcess<P> {
    inner: P,
    states: Arc<TrustAnchorStates>,
}

impl<P: ValidationProcess> TrackedProcess<P> {
    pub fn new(inner: P, states: Arc<TrustAnchorStates>) -> Self {
        Self { inner, states }
    }
}

#[async_trait]
impl<P: ValidationProcess> ValidationProcess for TrackedProcess<P> {
    fn trust_anchor(&self) -> &str {
        self.inner.trust_anchor()
    }

    async fn run_process(&self, force_new_fetch: bool) -> ProcessResult<Vec<ValidatedObject>> {
        let name = self.inner.trust_anchor();
        if !self.states.try_claim(name) {
            return Err(ProcessFailure::NotIdle);
        }

        let claim = Claim {
            states: &self.states,
            name,
            started: Instant::now(),
            released: false,
        };
        let result = self.inner.run_process(force_new_fetch).await;
        claim.release(&result);
        result
    }
}
