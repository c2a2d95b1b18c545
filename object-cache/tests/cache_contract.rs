//! Both cache backends must honor the same store/delete/evict contract

use chrono::{Duration, Utc};
use object_cache::{
    CachedObject, CertificateObject, InMemoryObjectCache, ObjectCache, ObjectKind, SqliteCacheConfig,
    SqliteObjectCache,
};
use std::sync::Arc;

fn self_signed_certificate() -> Vec<u8> {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params.custom_extensions.push(rcgen::CustomExtension::from_oid_content(
        &[1, 3, 6, 1, 5, 5, 7, 1, 7],
        vec![0x30, 0x08, 0x30, 0x06, 0x04, 0x02, 0x00, 0x01, 0x05, 0x00],
    ));
    params.self_signed(&key).unwrap().der().to_vec()
}

async fn exercise_contract(cache: Arc<dyn ObjectCache>) {
    let ta_uri = "rsync://rpki.example.net/ta/ta.cer";
    let earlier = Utc::now() - Duration::hours(2);

    let certificate = CertificateObject::parse(ta_uri, self_signed_certificate(), earlier).unwrap();
    cache.store_certificate("ripe", &certificate).await.unwrap();
    cache.store_certificate("ripe", &certificate).await.unwrap();

    let at_location = cache.objects_at(ta_uri).await.unwrap();
    assert_eq!(at_location.len(), 1);
    assert_eq!(at_location[0].kind, ObjectKind::Certificate);
    assert_eq!(at_location[0].hash, certificate.hash);

    let roa = CachedObject::new("ripe", "rsync://rpki.example.net/repo/a.roa", b"roa".to_vec(), earlier);
    let other = CachedObject::new("arin", "rsync://rpki.example.org/repo/b.roa", b"other".to_vec(), earlier);
    cache.store(roa.clone()).await.unwrap();
    cache.store(other.clone()).await.unwrap();
    assert_eq!(cache.len().await.unwrap(), 3);

    // a run that only revisits the trust anchor evicts its ROA, not the
    // objects of another trust anchor
    let run_start = Utc::now();
    cache
        .update_validation_timestamp("ripe", &[certificate.hash.clone()], run_start)
        .await
        .unwrap();
    assert_eq!(cache.clear_objects("ripe", run_start).await.unwrap(), 1);
    assert!(cache.find(&roa.hash).await.unwrap().is_none());
    assert!(cache.find(&certificate.hash).await.unwrap().is_some());
    assert!(cache.find(&other.hash).await.unwrap().is_some());

    assert_eq!(cache.delete(ta_uri).await.unwrap(), 1);
    assert_eq!(cache.clear_objects("arin", run_start).await.unwrap(), 1);
    assert!(cache.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_in_memory_backend_contract() {
    exercise_contract(Arc::new(InMemoryObjectCache::new())).await;
}

#[tokio::test]
async fn test_sqlite_backend_contract() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteCacheConfig {
        db_path: dir.path().join("objects.db").to_str().unwrap().to_string(),
        ..SqliteCacheConfig::default()
    };
    let cache = SqliteObjectCache::new(config).await.unwrap();
    exercise_contract(Arc::new(cache)).await;
}

#[tokio::test]
async fn test_sqlite_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteCacheConfig {
        db_path: dir.path().join("objects.db").to_str().unwrap().to_string(),
        ..SqliteCacheConfig::default()
    };

    // full-precision timestamps must come back unchanged
    let object = CachedObject::new("ripe", "rsync://rpki.example.net/repo/a.crl", b"crl".to_vec(), Utc::now());
    {
        let cache = SqliteObjectCache::new(config.clone()).await.unwrap();
        cache.store(object.clone()).await.unwrap();
        cache.close().await;
    }

    let reopened = SqliteObjectCache::new(config).await.unwrap();
    assert_eq!(reopened.find(&object.hash).await.unwrap(), Some(object));
}
