//! Trust anchor run state
//!
//! A single mutex guards the whole status map, so checking that a trust
//! anchor is idle and claiming it happen as one step. Every transition is
//! also broadcast to subscribers.

use crate::error::ProcessResult;
use crate::model::ValidatedObject;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const UPDATING_CERTIFICATE: &str = "Updating certificate";
pub const UPDATING_ROAS: &str = "Updating ROAs";

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrustAnchorState {
    Idle { next_update: DateTime<Utc> },
    Running { description: String },
}

impl TrustAnchorState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TrustAnchorState::Idle { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunResult {
    Succeeded { objects: usize },
    Failed { message: String },
}

/// Last completed run of a trust anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub finished_at: DateTime<Utc>,
    pub elapsed: std::time::Duration,
    pub result: RunResult,
}

/// Observer view of one trust anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustAnchorStatus {
    pub name: String,
    pub enabled: bool,
    pub state: TrustAnchorState,
    pub last_run: Option<RunOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub name: String,
    pub state: TrustAnchorState,
}

struct Entry {
    enabled: bool,
    state: TrustAnchorState,
    last_run: Option<RunOutcome>,
    latest_objects: Arc<Vec<ValidatedObject>>,
}

pub struct TrustAnchorStates {
    entries: Mutex<HashMap<String, Entry>>,
    interval: Duration,
    events: broadcast::Sender<StateChange>,
}

impl TrustAnchorStates {
    /// `interval` is the time between a completed run and the next
    /// scheduled one
    pub fn new(interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            interval,
            events,
        }
    }

    /// Add a trust anchor in the idle state, due immediately
    pub fn register(&self, name: &str, enabled: bool) {
        let state = TrustAnchorState::Idle { next_update: Utc::now() };
        self.entries.lock().insert(
            name.to_string(),
            Entry {
                enabled,
                state: state.clone(),
                last_run: None,
                latest_objects: Arc::new(Vec::new()),
            },
        );
        self.publish(name, state);
    }

    /// Atomically move an idle, enabled trust anchor to running. Returns
    /// false without changing anything otherwise.
    pub fn try_claim(&self, name: &str) -> bool {
        let state = {
            let mut entries = self.entries.lock();
            match entries.get_mut(name) {
                Some(entry) if entry.enabled && entry.state.is_idle() => {
                    entry.state = TrustAnchorState::Running {
                        description: UPDATING_CERTIFICATE.to_string(),
                    };
                    entry.state.clone()
                }
                _ => return false,
            }
        };
        self.publish(name, state);
        true
    }

    /// Update the progress text of a running trust anchor
    pub fn mark_running(&self, name: &str, description: &str) {
        let state = {
            let mut entries = self.entries.lock();
            match entries.get_mut(name) {
                Some(entry) if !entry.state.is_idle() => {
                    entry.state = TrustAnchorState::Running {
                        description: description.to_string(),
                    };
                    entry.state.clone()
                }
                _ => return,
            }
        };
        self.publish(name, state);
    }

    /// Return a trust anchor to idle and record how its run ended
    pub fn complete(&self, name: &str, result: &ProcessResult<Vec<ValidatedObject>>, elapsed: std::time::Duration) {
        let now = Utc::now();
        let state = TrustAnchorState::Idle {
            next_update: now + self.interval,
        };
        let run_result = match result {
            Ok(objects) => RunResult::Succeeded { objects: objects.len() },
            Err(failure) => RunResult::Failed {
                message: failure.message(),
            },
        };

        {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(name) else {
                return;
            };
            entry.state = state.clone();
            entry.last_run = Some(RunOutcome {
                finished_at: now,
                elapsed,
                result: run_result,
            });
            if let Ok(objects) = result {
                entry.latest_objects = Arc::new(objects.clone());
            }
        }
        self.publish(name, state);
    }

    /// Returns false for an unknown trust anchor
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.entries.lock().get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn status(&self, name: &str) -> Option<TrustAnchorStatus> {
        self.entries.lock().get(name).map(|entry| TrustAnchorStatus {
            name: name.to_string(),
            enabled: entry.enabled,
            state: entry.state.clone(),
            last_run: entry.last_run.clone(),
        })
    }

    /// Every trust anchor, sorted by name
    pub fn statuses(&self) -> Vec<TrustAnchorStatus> {
        let entries = self.entries.lock();
        let mut statuses: Vec<_> = entries
            .iter()
            .map(|(name, entry)| TrustAnchorStatus {
                name: name.clone(),
                enabled: entry.enabled,
                state: entry.state.clone(),
                last_run: entry.last_run.clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Objects of the last successful run
    pub fn latest_objects(&self, name: &str) -> Option<Arc<Vec<ValidatedObject>>> {
        self.entries.lock().get(name).map(|entry| entry.latest_objects.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    fn publish(&self, name: &str, state: TrustAnchorState) {
        // no subscribers is not an error
        let _ = self.events.send(StateChange {
            name: name.to_string(),
            state,
        });
    }
}
