//! Validation results and run options

use chrono::{DateTime, Utc};
use config_engine::ValidationSettings;
use object_cache::DecodedCertificate;
use serde::Serialize;
use std::collections::HashMap;

/// Check severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Passed,
    Warning,
    FetchError,
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Passed => "PASSED",
            ValidationStatus::Warning => "WARNING",
            ValidationStatus::FetchError => "FETCH_ERROR",
            ValidationStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded check: severity, stable key, message parameters and the
/// location it applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ValidationCheck {
    pub status: ValidationStatus,
    pub key: String,
    pub params: Vec<String>,
    pub location: String,
}

impl ValidationCheck {
    pub fn new(status: ValidationStatus, location: impl Into<String>, key: &str, params: Vec<String>) -> Self {
        Self {
            status,
            key: key.to_string(),
            params,
            location: location.into(),
        }
    }

    pub fn passed(location: impl Into<String>, key: &str) -> Self {
        Self::new(ValidationStatus::Passed, location, key, Vec::new())
    }

    pub fn warning(location: impl Into<String>, key: &str, params: Vec<String>) -> Self {
        Self::new(ValidationStatus::Warning, location, key, params)
    }

    pub fn fetch_error(location: impl Into<String>, key: &str, params: Vec<String>) -> Self {
        Self::new(ValidationStatus::FetchError, location, key, params)
    }

    pub fn error(location: impl Into<String>, key: &str, params: Vec<String>) -> Self {
        Self::new(ValidationStatus::Error, location, key, params)
    }

    /// Same check at a different severity
    pub fn with_status(mut self, status: ValidationStatus) -> Self {
        self.status = status;
        self
    }
}

/// Outcome of validating one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValidatedObject {
    Valid {
        uri: String,
        hash: String,
        checks: Vec<ValidationCheck>,
        #[serde(skip)]
        payload: Vec<u8>,
        certificate: Option<DecodedCertificate>,
    },
    Invalid {
        uri: String,
        checks: Vec<ValidationCheck>,
    },
}

impl ValidatedObject {
    pub fn uri(&self) -> &str {
        match self {
            ValidatedObject::Valid { uri, .. } | ValidatedObject::Invalid { uri, .. } => uri,
        }
    }

    pub fn checks(&self) -> &[ValidationCheck] {
        match self {
            ValidatedObject::Valid { checks, .. } | ValidatedObject::Invalid { checks, .. } => checks,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidatedObject::Valid { .. })
    }

    /// Most severe status among the checks, `Passed` when there are none
    pub fn status(&self) -> ValidationStatus {
        self.checks()
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(ValidationStatus::Passed)
    }

    pub fn has_check(&self, key: &str) -> bool {
        self.checks().iter().any(|check| check.key == key)
    }
}

/// Per-run scratch structure collecting checks by location, consumed when
/// the validated objects are built
#[derive(Debug, Default)]
pub struct ValidationResult {
    checks: HashMap<String, Vec<ValidationCheck>>,
    order: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: ValidationCheck) {
        if !self.checks.contains_key(&check.location) {
            self.order.push(check.location.clone());
        }
        self.checks.entry(check.location.clone()).or_default().push(check);
    }

    pub fn checks_at(&self, location: &str) -> &[ValidationCheck] {
        self.checks.get(location).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove and return the checks recorded for one location
    pub fn take(&mut self, location: &str) -> Vec<ValidationCheck> {
        self.order.retain(|l| l != location);
        self.checks.remove(location).unwrap_or_default()
    }

    /// Every remaining check, in first-recorded location order
    pub fn into_checks(mut self) -> Vec<ValidationCheck> {
        self.order
            .iter()
            .filter_map(|location| self.checks.remove(location))
            .flatten()
            .collect()
    }

    pub fn locations(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per-process tunables, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub max_stale_days: u32,
    pub loose_validation_enabled: bool,
    pub prefer_rrdp: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_stale_days: 0,
            loose_validation_enabled: false,
            prefer_rrdp: true,
        }
    }
}

impl ValidationOptions {
    /// Manifests and CRLs whose next update lies further in the past than
    /// this are stale
    pub fn stale_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.max_stale_days))
    }
}

impl From<&ValidationSettings> for ValidationOptions {
    fn from(settings: &ValidationSettings) -> Self {
        Self {
            max_stale_days: settings.max_stale_days,
            loose_validation_enabled: settings.loose_validation_enabled,
            prefer_rrdp: settings.prefer_rrdp,
        }
    }
}
