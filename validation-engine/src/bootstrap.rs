//! Trust anchor certificate bootstrap
//!
//! Every candidate location of the locator is fetched in order, each under
//! its own URI lock. A certificate whose SubjectPublicKeyInfo equals the
//! pinned key replaces whatever the cache held at that location. The first
//! location that produced a matching certificate supplies the trust anchor.

use crate::model::{ValidatedObject, ValidationCheck, ValidationResult, ValidationStatus};
use chrono::Utc;
use config_engine::TrustAnchorLocator;
use error_common::codes::{repository, trust_anchor};
use error_common::ValidatorError;
use object_cache::{CertificateObject, ObjectCache};
use repo_fetcher::{FetchError, RepoService};
use std::collections::HashSet;

pub const NO_TRUST_ANCHOR_CERTIFICATE: &str = "No trust anchor certificate";

fn fingerprint(spki: &[u8]) -> String {
    object_cache::content_hash(spki)
}

/// Fetch, verify and cache the trust anchor certificate.
///
/// Fetch problems and key mismatches become checks on the returned object.
/// Only cache failures are returned as errors.
pub async fn extract_trust_anchor(
    locator: &TrustAnchorLocator,
    fetcher: &dyn RepoService,
    cache: &dyn ObjectCache,
    force_new_fetch: bool,
) -> Result<ValidatedObject, ValidatorError> {
    let mut result = ValidationResult::new();
    let mut fetch_errors: Vec<FetchError> = Vec::new();
    let mut matching: Vec<CertificateObject> = Vec::new();

    for uri in &locator.certificate_locations {
        let _guard = fetcher.lock(uri.as_str()).await;

        let certificate = match fetcher.visit_trust_anchor_certificate(uri, force_new_fetch).await {
            Ok(certificate) => certificate,
            Err(errors) => {
                tracing::warn!(
                    trust_anchor = %locator.name,
                    uri = %uri,
                    errors = errors.len(),
                    "Trust anchor certificate fetch failed"
                );
                fetch_errors.extend(errors);
                continue;
            }
        };

        if certificate.decoded.subject_public_key_info != locator.public_key_info {
            tracing::warn!(trust_anchor = %locator.name, uri = %uri, "Trust anchor public key mismatch");
            result.add(ValidationCheck::error(
                uri.as_str(),
                trust_anchor::PUBLIC_KEY_MATCH,
                vec![
                    fingerprint(&locator.public_key_info),
                    fingerprint(&certificate.decoded.subject_public_key_info),
                ],
            ));
            continue;
        }

        cache.delete(uri.as_str()).await?;
        cache.store_certificate(&locator.name, &certificate).await?;
        cache
            .update_validation_timestamp(&locator.name, &[certificate.hash.clone()], Utc::now())
            .await?;
        result.add(ValidationCheck::passed(uri.as_str(), trust_anchor::PUBLIC_KEY_MATCH));
        matching.push(certificate);
    }

    let Some(head) = matching.first() else {
        return Ok(missing(locator, result, fetch_errors));
    };

    let location = head.uri.clone();
    let distinct: HashSet<&str> = matching
        .iter()
        .filter(|certificate| certificate.uri == location)
        .map(|certificate| certificate.hash.as_str())
        .collect();

    let mut checks = result.take(&location);
    if distinct.len() > 1 {
        tracing::error!(
            trust_anchor = %locator.name,
            uri = %location,
            certificates = distinct.len(),
            "Ambiguous trust anchor certificate"
        );
        cache.delete(&location).await?;
        checks.push(ValidationCheck::error(
            location.as_str(),
            trust_anchor::CERTIFICATE_AMBIGUOUS,
            vec![distinct.len().to_string()],
        ));
        checks.extend(result.into_checks());
        return Ok(ValidatedObject::Invalid { uri: location, checks });
    }

    // mismatches next to the accepted certificate, at its location or at
    // other candidates, do not invalidate it
    checks.extend(result.into_checks());
    let mut checks: Vec<_> = checks
        .into_iter()
        .map(|check| match check.status {
            ValidationStatus::Error => check.with_status(ValidationStatus::Warning),
            _ => check,
        })
        .collect();
    checks.extend(
        fetch_errors
            .into_iter()
            .map(|error| fetch_check(error, ValidationStatus::Warning)),
    );

    tracing::info!(
        trust_anchor = %locator.name,
        uri = %location,
        hash = %head.hash,
        "Trust anchor certificate accepted"
    );

    Ok(ValidatedObject::Valid {
        uri: location,
        hash: head.hash.clone(),
        checks,
        payload: head.encoded.clone(),
        certificate: Some(head.decoded.clone()),
    })
}

fn fetch_check(error: FetchError, status: ValidationStatus) -> ValidationCheck {
    ValidationCheck::new(status, error.uri, repository::FETCH, vec![error.message])
}

fn missing(locator: &TrustAnchorLocator, result: ValidationResult, fetch_errors: Vec<FetchError>) -> ValidatedObject {
    let uri = locator
        .certificate_locations
        .first()
        .map(|uri| uri.to_string())
        .unwrap_or_else(|| locator.name.clone());

    tracing::error!(trust_anchor = %locator.name, fetch_errors = fetch_errors.len(), "{}", NO_TRUST_ANCHOR_CERTIFICATE);

    let mut checks = vec![ValidationCheck::error(
        uri.as_str(),
        trust_anchor::CERTIFICATE_MISSING,
        vec![NO_TRUST_ANCHOR_CERTIFICATE.to_string()],
    )];
    checks.extend(result.into_checks());
    checks.extend(
        fetch_errors
            .into_iter()
            .map(|error| fetch_check(error, ValidationStatus::FetchError)),
    );

    ValidatedObject::Invalid { uri, checks }
}
