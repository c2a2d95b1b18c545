//! Process-level failure of a validation run

use thiserror::Error;

pub const NOT_IDLE_MESSAGE: &str = "Trust anchor not idle or enabled";

/// Why a run produced no validated objects. Object-level problems never
/// show up here; they are checks on the validated objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessFailure {
    /// Another run is active or the trust anchor is disabled
    #[error("Trust anchor not idle or enabled")]
    NotIdle,

    /// Unexpected error or panic during the run
    #[error("{0}")]
    Failed(String),
}

impl ProcessFailure {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type ProcessResult<T> = Result<T, ProcessFailure>;
