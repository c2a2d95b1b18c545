//! Per-run summary printed by `--once`

use serde::Serialize;
use std::fmt;
use validation_engine::{ProcessFailure, ProcessResult, ValidatedObject, ValidationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustAnchorSummary {
    pub trust_anchor: String,
    pub outcome: Outcome,
    pub valid: usize,
    pub invalid: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrustAnchorSummary {
    pub fn from_result(trust_anchor: &str, result: &ProcessResult<Vec<ValidatedObject>>) -> Self {
        let (outcome, objects, message) = match result {
            Ok(objects) => (Outcome::Completed, objects.as_slice(), None),
            Err(failure @ ProcessFailure::NotIdle) => (Outcome::Rejected, &[][..], Some(failure.message())),
            Err(failure) => (Outcome::Failed, &[][..], Some(failure.message())),
        };
        let valid = objects.iter().filter(|o| o.is_valid()).count();

        Self {
            trust_anchor: trust_anchor.to_string(),
            outcome,
            valid,
            invalid: objects.len() - valid,
            warnings: objects
                .iter()
                .filter(|o| o.status() == ValidationStatus::Warning)
                .count(),
            message,
        }
    }
}

impl fmt::Display for TrustAnchorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.trust_anchor, message),
            None => write!(
                f,
                "{}: {} valid, {} invalid, {} with warnings",
                self.trust_anchor, self.valid, self.invalid, self.warnings
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub trust_anchors: Vec<TrustAnchorSummary>,
}

impl RunSummary {
    pub fn new(results: &[(String, ProcessResult<Vec<ValidatedObject>>)]) -> Self {
        Self {
            trust_anchors: results
                .iter()
                .map(|(name, result)| TrustAnchorSummary::from_result(name, result))
                .collect(),
        }
    }

    /// True when no run failed and every trust anchor certificate validated
    pub fn is_success(&self) -> bool {
        self.trust_anchors
            .iter()
            .all(|s| s.outcome == Outcome::Completed && s.valid > 0)
    }
}
