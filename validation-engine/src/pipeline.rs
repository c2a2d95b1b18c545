//! Fixed composition of the process layers
//!
//! `LoggedProcess(TrackedProcess(TrustAnchorValidationProcess))`, with the
//! base process calling the logging hooks before the state hooks.

use crate::logged::{LoggedProcess, LoggingHooks};
use crate::model::ValidationOptions;
use crate::process::{TrustAnchorValidationProcess, ValidationProcess};
use crate::state::TrustAnchorStates;
use crate::tracked::{StateHooks, TrackedProcess};
use crate::walker::TopDownWalker;
use config_engine::TrustAnchorLocator;
use object_cache::ObjectCache;
use repo_fetcher::RepoService;
use std::sync::Arc;

/// Collaborators of one trust anchor's process
#[derive(Clone)]
pub struct ProcessParts {
    pub locator: Arc<TrustAnchorLocator>,
    pub fetcher: Arc<dyn RepoService>,
    pub cache: Arc<dyn ObjectCache>,
    pub walker: Arc<dyn TopDownWalker>,
    pub options: ValidationOptions,
}

/// Build the full process for one trust anchor and register it, enabled,
/// with the state tracker
pub fn compose(parts: ProcessParts, states: Arc<TrustAnchorStates>) -> Arc<dyn ValidationProcess> {
    states.register(&parts.locator.name, true);

    let base = TrustAnchorValidationProcess::new(
        parts.locator,
        parts.fetcher.clone(),
        parts.cache,
        parts.walker,
        parts.options,
    )
    .with_hook(Arc::new(LoggingHooks))
    .with_hook(Arc::new(StateHooks::new(states.clone())));

    let tracked = TrackedProcess::new(base, states);
    Arc::new(LoggedProcess::new(tracked, parts.fetcher.as_ref()))
}
