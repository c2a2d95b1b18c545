//! Validator assembly

use anyhow::Context;
use config_engine::{CacheBackend, CacheSettings, TrustAnchorLocator, ValidatorConfig};
use object_cache::{InMemoryObjectCache, ObjectCache, SqliteCacheConfig, SqliteObjectCache};
use repo_fetcher::{FetchService, RepositoryMirror, UriLocks};
use std::sync::Arc;
use std::time::Duration;
use validation_engine::{
    compose, ProcessParts, TopDownWalker, TrustAnchorOnlyWalker, TrustAnchorStates, ValidationOptions,
    ValidationScheduler,
};

/// A fully wired validator. Every trust anchor shares the object cache,
/// the URI locks and the repository mirror.
pub struct Validator {
    pub scheduler: ValidationScheduler,
    pub states: Arc<TrustAnchorStates>,
    pub cache: Arc<dyn ObjectCache>,
    sqlite: Option<SqliteObjectCache>,
}

impl Validator {
    pub async fn build(config: &ValidatorConfig, locators: Vec<TrustAnchorLocator>) -> anyhow::Result<Self> {
        let (cache, sqlite) = open_cache(&config.cache).await?;

        let interval = Duration::from_secs(config.validation.interval_minutes.saturating_mul(60));
        let states = Arc::new(TrustAnchorStates::new(
            chrono::Duration::from_std(interval).context("validation interval out of range")?,
        ));

        let locks = UriLocks::default();
        let mirror = Arc::new(RepositoryMirror::new());
        let options = ValidationOptions::from(&config.validation);
        let walker: Arc<dyn TopDownWalker> = Arc::new(TrustAnchorOnlyWalker);

        let mut scheduler = ValidationScheduler::new(interval);
        for locator in locators {
            let fetcher = FetchService::from_settings(&config.fetch, locks.clone(), mirror.clone())
                .with_context(|| format!("creating fetcher for {}", locator.name))?;
            tracing::info!(
                trust_anchor = %locator.name,
                locations = locator.certificate_locations.len(),
                prefetch = locator.prefetch_uris.len(),
                "Trust anchor registered"
            );
            scheduler.add(compose(
                ProcessParts {
                    locator: Arc::new(locator),
                    fetcher: Arc::new(fetcher),
                    cache: cache.clone(),
                    walker: walker.clone(),
                    options,
                },
                states.clone(),
            ));
        }

        Ok(Self {
            scheduler,
            states,
            cache,
            sqlite,
        })
    }

    /// Release the cache connections
    pub async fn close(&self) {
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }
    }
}

async fn open_cache(settings: &CacheSettings) -> anyhow::Result<(Arc<dyn ObjectCache>, Option<SqliteObjectCache>)> {
    match settings.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory object cache");
            Ok((Arc::new(InMemoryObjectCache::new()), None))
        }
        CacheBackend::Sqlite => {
            let db_path = settings.sqlite_path.display().to_string();
            let sqlite = SqliteObjectCache::new(SqliteCacheConfig {
                db_path: db_path.clone(),
                max_connections: settings.max_connections,
                enable_wal: true,
            })
            .await
            .with_context(|| format!("opening object cache at {}", db_path))?;
            tracing::info!(path = %db_path, "Using SQLite object cache");
            Ok((Arc::new(sqlite.clone()), Some(sqlite)))
        }
    }
}
