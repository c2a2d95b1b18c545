//! End-to-end behavior of composed validation processes

mod common;

use chrono::{Duration, Utc};
use common::*;
use error_common::codes::{repository, trust_anchor};
use object_cache::{CachedObject, InMemoryObjectCache, ObjectCache};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::assert_err;
use validation_engine::state::{RunResult, UPDATING_ROAS};
use validation_engine::{
    compose, ProcessFailure, ProcessParts, TrustAnchorOnlyWalker, TrustAnchorState, TrustAnchorStates,
    ValidatedObject, ValidationCheck, ValidationOptions, ValidationStatus,
};

fn only_object(objects: &[ValidatedObject]) -> &ValidatedObject {
    assert_eq!(objects.len(), 1, "expected a single object, got {:?}", objects);
    &objects[0]
}

#[tokio::test]
async fn test_matching_certificate_is_valid_and_cached() {
    let key = key_pair();
    let der = certificate(&key, 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, Arc::new(TrustAnchorOnlyWalker));
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(ta.is_valid());
    assert_eq!(ta.status(), ValidationStatus::Passed);
    assert_eq!(ta.uri(), TA_URI);
    assert!(ta.has_check(trust_anchor::PUBLIC_KEY_MATCH));
    assert_eq!(cached_at(h.cache.as_ref(), TA_URI).await, 1);
}

#[tokio::test]
async fn test_key_mismatch_is_invalid() {
    let der = certificate(&key_pair(), 1, true);
    let pinned = public_key_info(&certificate(&key_pair(), 1, true));
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der));

    let h = harness(locator(&[TA_URI], pinned), fetcher, Arc::new(TrustAnchorOnlyWalker));
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(!ta.is_valid());
    assert_eq!(ta.status(), ValidationStatus::Error);
    assert!(ta.has_check(trust_anchor::PUBLIC_KEY_MATCH));
    assert!(ta.has_check(trust_anchor::CERTIFICATE_MISSING));
    assert!(ta
        .checks()
        .iter()
        .any(|c| c.params == vec!["No trust anchor certificate".to_string()]));
    assert!(h.cache.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_fetch_failure_is_invalid_with_fetch_error() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Err("connection refused"));

    let pinned = public_key_info(&certificate(&key_pair(), 1, true));
    let h = harness(locator(&[TA_URI], pinned), fetcher, Arc::new(TrustAnchorOnlyWalker));
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(!ta.is_valid());
    assert_eq!(ta.status(), ValidationStatus::Error);
    assert!(ta.checks().contains(&ValidationCheck::fetch_error(
        TA_URI,
        repository::FETCH,
        vec!["connection refused".to_string()]
    )));
}

#[tokio::test]
async fn test_two_matching_certificates_at_one_location_are_ambiguous() {
    let key = key_pair();
    let first = certificate(&key, 1, true);
    let second = certificate(&key, 2, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(first.clone()));
    fetcher.respond(TA_URI, Ok(second));

    let h = harness(
        locator(&[TA_URI, TA_URI], public_key_info(&first)),
        fetcher,
        Arc::new(TrustAnchorOnlyWalker),
    );
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(!ta.is_valid());
    assert_eq!(ta.status(), ValidationStatus::Error);
    assert!(ta.has_check(trust_anchor::CERTIFICATE_AMBIGUOUS));
    assert_eq!(cached_at(h.cache.as_ref(), TA_URI).await, 0);
}

#[tokio::test]
async fn test_match_and_mismatch_at_one_location_warns() {
    let key = key_pair();
    let matching = certificate(&key, 1, true);
    let other = certificate(&key_pair(), 2, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(matching.clone()));
    fetcher.respond(TA_URI, Ok(other));

    let h = harness(
        locator(&[TA_URI, TA_URI], public_key_info(&matching)),
        fetcher,
        Arc::new(TrustAnchorOnlyWalker),
    );
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(ta.is_valid());
    assert_eq!(ta.status(), ValidationStatus::Warning);
    assert!(ta
        .checks()
        .iter()
        .any(|c| c.key == trust_anchor::PUBLIC_KEY_MATCH && c.status == ValidationStatus::Warning));
}

#[tokio::test]
async fn test_later_candidate_used_when_first_fails() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Err("timeout"));
    fetcher.respond(TA_HTTPS_URI, Ok(der.clone()));

    let h = harness(
        locator(&[TA_URI, TA_HTTPS_URI], public_key_info(&der)),
        fetcher,
        Arc::new(TrustAnchorOnlyWalker),
    );
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(ta.is_valid());
    assert_eq!(ta.uri(), TA_HTTPS_URI);
    assert_eq!(ta.status(), ValidationStatus::Warning);
    assert!(ta.checks().contains(&ValidationCheck::warning(
        TA_URI,
        repository::FETCH,
        vec!["timeout".to_string()]
    )));
}

#[tokio::test]
async fn test_mismatch_at_earlier_candidate_is_reported() {
    let der = certificate(&key_pair(), 1, true);
    let foreign = certificate(&key_pair(), 2, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(foreign));
    fetcher.respond(TA_HTTPS_URI, Ok(der.clone()));

    let h = harness(
        locator(&[TA_URI, TA_HTTPS_URI], public_key_info(&der)),
        fetcher,
        Arc::new(TrustAnchorOnlyWalker),
    );
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(ta.is_valid());
    assert_eq!(ta.uri(), TA_HTTPS_URI);
    assert_eq!(ta.status(), ValidationStatus::Warning);
    assert!(ta.checks().iter().any(|c| c.location == TA_URI
        && c.key == trust_anchor::PUBLIC_KEY_MATCH
        && c.status == ValidationStatus::Warning));
    assert_eq!(cached_at(h.cache.as_ref(), TA_URI).await, 0);
    assert_eq!(cached_at(h.cache.as_ref(), TA_HTTPS_URI).await, 1);
}

#[tokio::test]
async fn test_trust_anchors_sharing_a_cache_keep_each_others_objects() {
    let cache = Arc::new(InMemoryObjectCache::new());
    let states = Arc::new(TrustAnchorStates::new(Duration::minutes(10)));

    let mut processes = Vec::new();
    for (name, uri) in [("ta-a", TA_URI), ("ta-b", TA_HTTPS_URI)] {
        let der = certificate(&key_pair(), 1, true);
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(uri, Ok(der.clone()));
        processes.push(compose(
            ProcessParts {
                locator: named_locator(name, &[uri], public_key_info(&der)),
                fetcher,
                cache: cache.clone(),
                walker: Arc::new(TrustAnchorOnlyWalker),
                options: ValidationOptions::default(),
            },
            states.clone(),
        ));
    }

    for process in &processes {
        process.run_process(false).await.unwrap();
    }

    assert_eq!(cached_at(cache.as_ref(), TA_URI).await, 1);
    assert_eq!(cached_at(cache.as_ref(), TA_HTTPS_URI).await, 1);
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, Arc::new(TrustAnchorOnlyWalker));
    let first = h.process.run_process(false).await.unwrap();
    let second = h.process.run_process(false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.cache.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_objects_not_seen_in_run_are_evicted() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let earlier = Utc::now() - Duration::hours(1);
    let withdrawn = CachedObject::new("test-ta", "rsync://rpki.example.net/repo/gone.roa", b"gone".to_vec(), earlier);
    let revisited = CachedObject::new("test-ta", "rsync://rpki.example.net/repo/kept.roa", b"kept".to_vec(), earlier);

    let walker = Arc::new(StaticWalker {
        refresh: vec![revisited.hash.clone()],
        ..StaticWalker::default()
    });
    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, walker);
    h.cache.store(withdrawn.clone()).await.unwrap();
    h.cache.store(revisited.clone()).await.unwrap();

    h.process.run_process(false).await.unwrap();

    assert!(h.cache.find(&withdrawn.hash).await.unwrap().is_none());
    assert!(h.cache.find(&revisited.hash).await.unwrap().is_some());
    assert_eq!(cached_at(h.cache.as_ref(), TA_URI).await, 1);
}

#[tokio::test]
async fn test_eviction_runs_after_failed_walk() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let stale = CachedObject::new(
        "test-ta",
        "rsync://rpki.example.net/repo/stale.roa",
        b"stale".to_vec(),
        Utc::now() - Duration::hours(1),
    );
    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, Arc::new(FailingWalker));
    h.cache.store(stale.clone()).await.unwrap();

    let failure = assert_err!(h.process.run_process(false).await);
    assert_eq!(failure, ProcessFailure::Failed("manifest unreachable".to_string()));
    assert!(h.cache.find(&stale.hash).await.unwrap().is_none());

    let status = h.states.status("test-ta").unwrap();
    assert!(status.state.is_idle());
    assert_eq!(
        status.last_run.unwrap().result,
        RunResult::Failed {
            message: "manifest unreachable".to_string()
        }
    );
}

#[tokio::test]
async fn test_invalid_trust_anchor_leaves_cache_alone() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Err("unreachable"));

    let stale = CachedObject::new(
        "test-ta",
        "rsync://rpki.example.net/repo/a.roa",
        b"roa".to_vec(),
        Utc::now() - Duration::hours(1),
    );
    let pinned = public_key_info(&certificate(&key_pair(), 1, true));
    let walker = Arc::new(StaticWalker::default());
    let h = harness(locator(&[TA_URI], pinned), fetcher, walker.clone());
    h.cache.store(stale.clone()).await.unwrap();

    h.process.run_process(false).await.unwrap();

    assert_eq!(walker.calls.load(Ordering::SeqCst), 0);
    assert!(h.cache.find(&stale.hash).await.unwrap().is_some());
}

#[tokio::test]
async fn test_walk_results_precede_trust_anchor() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let roa = ValidatedObject::Invalid {
        uri: "rsync://rpki.example.net/repo/a.roa".to_string(),
        checks: vec![ValidationCheck::error("rsync://rpki.example.net/repo/a.roa", "ROA_SIGNATURE", vec![])],
    };
    let walker = Arc::new(StaticWalker {
        objects: vec![roa.clone()],
        ..StaticWalker::default()
    });
    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, walker);

    let objects = h.process.run_process(false).await.unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0], roa);
    assert_eq!(objects[1].uri(), TA_URI);
    assert_eq!(h.states.latest_objects("test-ta").unwrap().len(), 2);
}

#[tokio::test]
async fn test_prefetch_happens_before_walk() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let prefetch = url::Url::parse("rsync://rpki.example.net/repository/").unwrap();
    let locator = Arc::new(
        config_engine::TrustAnchorLocator::new(
            "test-ta",
            vec![url::Url::parse(TA_URI).unwrap()],
            public_key_info(&der),
        )
        .with_prefetch_uris(vec![prefetch.clone()]),
    );
    let walker = Arc::new(StaticWalker {
        fetcher: Some(fetcher.clone()),
        ..StaticWalker::default()
    });
    let h = harness(locator, fetcher, walker.clone());

    h.process.run_process(false).await.unwrap();
    assert_eq!(
        walker.prefetched_at_walk.lock().clone(),
        Some(vec![prefetch.to_string()])
    );
}

#[tokio::test]
async fn test_non_resource_certificate_is_not_walked() {
    let der = certificate(&key_pair(), 1, false);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let walker = Arc::new(StaticWalker::default());
    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, walker.clone());
    let objects = h.process.run_process(false).await.unwrap();

    let ta = only_object(&objects);
    assert!(!ta.is_valid());
    assert!(ta.has_check(trust_anchor::NOT_RESOURCE_CERTIFICATE));
    assert_eq!(walker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_busy_trust_anchor_is_rejected_without_fetching() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let walker = Arc::new(BlockingWalker::default());
    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher.clone(), walker.clone());

    let running = {
        let process = h.process.clone();
        tokio::spawn(async move { process.run_process(false).await })
    };
    walker.entered.notified().await;

    assert_eq!(
        h.states.status("test-ta").unwrap().state,
        TrustAnchorState::Running {
            description: UPDATING_ROAS.to_string()
        }
    );

    let calls = fetcher.calls();
    let rejected = assert_err!(h.process.run_process(true).await);
    assert_eq!(rejected, ProcessFailure::NotIdle);
    assert_eq!(rejected.message(), "Trust anchor not idle or enabled");
    assert_eq!(fetcher.calls(), calls);

    walker.release.notify_one();
    assert!(running.await.unwrap().is_ok());
    assert!(h.states.status("test-ta").unwrap().state.is_idle());
}

#[tokio::test]
async fn test_disabled_trust_anchor_is_rejected() {
    let fetcher = ScriptedFetcher::new();
    let pinned = public_key_info(&certificate(&key_pair(), 1, true));
    let h = harness(locator(&[TA_URI], pinned), fetcher.clone(), Arc::new(TrustAnchorOnlyWalker));

    assert!(h.states.set_enabled("test-ta", false));
    assert_eq!(h.process.run_process(false).await, Err(ProcessFailure::NotIdle));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_panic_in_walk_becomes_failure() {
    let der = certificate(&key_pair(), 1, true);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(TA_URI, Ok(der.clone()));

    let h = harness(locator(&[TA_URI], public_key_info(&der)), fetcher, Arc::new(PanickingWalker));

    let failure = assert_err!(h.process.run_process(false).await);
    assert_eq!(failure, ProcessFailure::Failed("walker exploded".to_string()));

    // the trust anchor was released and can run again
    assert!(h.states.status("test-ta").unwrap().state.is_idle());
    assert!(matches!(
        h.process.run_process(false).await,
        Err(ProcessFailure::Failed(_))
    ));
}
