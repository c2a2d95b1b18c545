//! SQLite-backed object cache
//!
//! Objects live in a single `objects` table keyed by content hash.
//! Timestamps are stored as Unix nanoseconds so eviction is a plain
//! integer comparison and round-trips are exact.

use crate::cache::ObjectCache;
use crate::error::{CacheError, CacheResult};
use crate::object::{CachedObject, ObjectKind};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

/// Configuration for the SQLite cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteCacheConfig {
    /// Path to the database file
    pub db_path: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Whether to enable WAL mode
    pub enable_wal: bool,
}

impl Default for SqliteCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "rpki-cache.db".to_string(),
            max_connections: 5,
            enable_wal: true,
        }
    }
}

/// Object cache handle over a SQLite connection pool
#[derive(Clone)]
pub struct SqliteObjectCache {
    pool: SqlitePool,
}

impl SqliteObjectCache {
    /// Open (creating if needed) the database and initialize the schema
    pub async fn new(config: SqliteCacheConfig) -> CacheResult<Self> {
        let journal_mode = if config.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.db_path))?
            .create_if_missing(true)
            .journal_mode(journal_mode);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.initialize_schema().await?;

        tracing::info!(db_path = %config.db_path, wal = config.enable_wal, "Opened SQLite object cache");
        Ok(cache)
    }

    async fn initialize_schema(&self) -> CacheResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                hash TEXT PRIMARY KEY,
                trust_anchor TEXT NOT NULL,
                uri TEXT NOT NULL,
                kind TEXT NOT NULL,
                encoded BLOB NOT NULL,
                fetched_at INTEGER NOT NULL,
                validated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_objects_uri ON objects(uri)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_objects_trust_anchor_validated_at ON objects(trust_anchor, validated_at)",
        )
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_nanos(at: DateTime<Utc>) -> CacheResult<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| CacheError::InvalidObject(format!("Timestamp out of range: {}", at)))
}

fn row_to_object(row: &SqliteRow) -> CacheResult<CachedObject> {
    let kind: String = row.try_get("kind")?;
    Ok(CachedObject {
        hash: row.try_get("hash")?,
        trust_anchor: row.try_get("trust_anchor")?,
        uri: row.try_get("uri")?,
        kind: ObjectKind::parse(&kind)?,
        encoded: row.try_get("encoded")?,
        fetched_at: Utc.timestamp_nanos(row.try_get("fetched_at")?),
        validated_at: Utc.timestamp_nanos(row.try_get("validated_at")?),
    })
}

fn affected(rows: u64) -> usize {
    usize::try_from(rows).unwrap_or(usize::MAX)
}

#[async_trait]
impl ObjectCache for SqliteObjectCache {
    async fn store(&self, object: CachedObject) -> CacheResult<()> {
        sqlx::query(
            r#"
            INSERT INTO objects (hash, trust_anchor, uri, kind, encoded, fetched_at, validated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                trust_anchor = excluded.trust_anchor,
                uri = excluded.uri,
                fetched_at = excluded.fetched_at,
                validated_at = excluded.validated_at
            "#,
        )
        .bind(&object.hash)
        .bind(&object.trust_anchor)
        .bind(&object.uri)
        .bind(object.kind.as_str())
        .bind(&object.encoded)
        .bind(to_nanos(object.fetched_at)?)
        .bind(to_nanos(object.validated_at)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, uri: &str) -> CacheResult<usize> {
        let result = sqlx::query("DELETE FROM objects WHERE uri = ?")
            .bind(uri)
            .execute(&self.pool)
            .await?;
        Ok(affected(result.rows_affected()))
    }

    async fn update_validation_timestamp(
        &self,
        trust_anchor: &str,
        hashes: &[String],
        validated_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        if hashes.is_empty() {
            return Ok(());
        }

        let nanos = to_nanos(validated_at)?;
        let mut tx = self.pool.begin().await?;
        for hash in hashes {
            sqlx::query("UPDATE objects SET validated_at = ?, trust_anchor = ? WHERE hash = ?")
                .bind(nanos)
                .bind(trust_anchor)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_objects(&self, trust_anchor: &str, since: DateTime<Utc>) -> CacheResult<usize> {
        let result = sqlx::query("DELETE FROM objects WHERE trust_anchor = ? AND validated_at < ?")
            .bind(trust_anchor)
            .bind(to_nanos(since)?)
            .execute(&self.pool)
            .await?;

        let removed = affected(result.rows_affected());
        if removed > 0 {
            tracing::debug!(trust_anchor, removed, since = %since, "Evicted stale cached objects");
        }
        Ok(removed)
    }

    async fn objects_at(&self, uri: &str) -> CacheResult<Vec<CachedObject>> {
        let rows = sqlx::query(
            "SELECT hash, trust_anchor, uri, kind, encoded, fetched_at, validated_at FROM objects WHERE uri = ? ORDER BY fetched_at",
        )
        .bind(uri)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_object).collect()
    }

    async fn find(&self, hash: &str) -> CacheResult<Option<CachedObject>> {
        let row = sqlx::query(
            "SELECT hash, trust_anchor, uri, kind, encoded, fetched_at, validated_at FROM objects WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_object).transpose()
    }

    async fn len(&self) -> CacheResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
            .fetch_one(&self.pool)
            .await?;
        usize::try_from(count).map_err(|_| CacheError::Corrupt(format!("Negative row count: {}", count)))
    }
}
