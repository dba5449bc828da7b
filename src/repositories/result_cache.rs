//! Durable search-result and thumbnail caches
//!
//! Reads fail open: any store or decode error is reported as "no entry" so
//! the gateway falls through to the upstream API. Writes are an optimization
//! and their failures are logged and swallowed.
//!
//! A search answer with zero results is never stored, so "cached empty" and
//! "never queried" are the same thing here and empty answers are re-queried
//! upstream on every call.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, error, info, warn};

use crate::errors::RepositoryResult;
use crate::models::{CacheEntry, CacheStats, ResultRecord, ThumbnailEntry};
use crate::repositories::UsageLedger;
use crate::utils::datetime::{format_timestamp, parse_timestamp};

/// Canonical cache key for a search string: trimmed and lowercased
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Clone)]
pub struct ResultCache {
    pool: Pool<Sqlite>,
}

impl ResultCache {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Cached records for `query`, or an empty vector when there is no usable entry
    pub async fn lookup_results(&self, query: &str) -> Vec<ResultRecord> {
        self.lookup_entry(query)
            .await
            .map(|entry| entry.results)
            .unwrap_or_default()
    }

    pub async fn lookup_entry(&self, query: &str) -> Option<CacheEntry> {
        let key = normalize_query(query);
        if key.is_empty() {
            return None;
        }

        match self.try_lookup_entry(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to read cached search results for '{}': {}", key, e);
                None
            }
        }
    }

    /// Overwrite the entry for `query`; empty result sets are not stored
    pub async fn store_results(&self, query: &str, results: &[ResultRecord]) {
        let key = normalize_query(query);
        if key.is_empty() || results.is_empty() {
            return;
        }

        match self.try_store_results(&key, results).await {
            Ok(()) => debug!("Cached {} results for query '{}'", results.len(), key),
            Err(e) => error!("Failed to cache search results for '{}': {}", key, e),
        }
    }

    pub async fn lookup_thumbnail(&self, url: &str) -> Option<Vec<u8>> {
        self.lookup_thumbnail_entry(url)
            .await
            .map(|entry| entry.image_data)
    }

    pub async fn lookup_thumbnail_entry(&self, url: &str) -> Option<ThumbnailEntry> {
        if url.is_empty() {
            return None;
        }

        match self.try_lookup_thumbnail(url).await {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to read cached thumbnail {}: {}", url, e);
                None
            }
        }
    }

    /// Overwrite the bytes cached for `url`; empty url or bytes is a no-op
    pub async fn store_thumbnail(&self, url: &str, image_data: &[u8]) {
        if url.is_empty() || image_data.is_empty() {
            warn!("Invalid thumbnail data provided for caching");
            return;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO thumbnail_cache (url, image_data, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET image_data = excluded.image_data, created_at = excluded.created_at
            "#,
        )
        .bind(url)
        .bind(image_data)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => debug!("Thumbnail cached: {} ({} bytes)", url, image_data.len()),
            Err(e) => error!("Failed to cache thumbnail {}: {}", url, e),
        }
    }

    /// Administrative wipe of both caches and every usage record, in one transaction
    pub async fn clear(&self, ledger: &UsageLedger) -> bool {
        match self.try_clear().await {
            Ok(()) => {
                ledger.notify_cleared();
                info!("Cache cleared successfully");
                true
            }
            Err(e) => {
                error!("Failed to clear cache: {}", e);
                false
            }
        }
    }

    /// Drop search entries created before `cutoff`; never called on the search path
    pub async fn prune_search_results_older_than(&self, cutoff: DateTime<Utc>) -> u64 {
        let result = sqlx::query("DELETE FROM search_cache WHERE created_at < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                let removed = done.rows_affected();
                if removed > 0 {
                    info!("Pruned {} cached searches older than {}", removed, cutoff);
                }
                removed
            }
            Err(e) => {
                error!("Failed to prune search cache: {}", e);
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM search_cache) AS search_entries,
                (SELECT COUNT(*) FROM thumbnail_cache) AS thumbnail_entries,
                (SELECT COALESCE(SUM(LENGTH(image_data)), 0) FROM thumbnail_cache) AS thumbnail_bytes
            "#,
        )
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => CacheStats {
                search_entries: count_column(&row, "search_entries"),
                thumbnail_entries: count_column(&row, "thumbnail_entries"),
                thumbnail_bytes: count_column(&row, "thumbnail_bytes"),
            },
            Err(e) => {
                error!("Failed to read cache stats: {}", e);
                CacheStats::default()
            }
        }
    }

    async fn try_lookup_entry(&self, key: &str) -> RepositoryResult<Option<CacheEntry>> {
        let row = sqlx::query("SELECT results, created_at FROM search_cache WHERE normalized_query = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("results")?;
        let results: Vec<ResultRecord> = serde_json::from_str(&payload)?;
        if results.is_empty() {
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            normalized_query: key.to_string(),
            results,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)
                .unwrap_or_else(Utc::now),
        }))
    }

    async fn try_lookup_thumbnail(&self, url: &str) -> RepositoryResult<Option<ThumbnailEntry>> {
        let row = sqlx::query("SELECT image_data, created_at FROM thumbnail_cache WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let image_data: Vec<u8> = row.try_get("image_data")?;
        if image_data.is_empty() {
            return Ok(None);
        }

        Ok(Some(ThumbnailEntry {
            url: url.to_string(),
            image_data,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)
                .unwrap_or_else(Utc::now),
        }))
    }

    async fn try_store_results(&self, key: &str, results: &[ResultRecord]) -> RepositoryResult<()> {
        let payload = serde_json::to_string(results)?;

        sqlx::query(
            r#"
            INSERT INTO search_cache (normalized_query, results, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(normalized_query) DO UPDATE SET results = excluded.results, created_at = excluded.created_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_clear(&self) -> RepositoryResult<()> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query("DELETE FROM thumbnail_cache")
            .execute(&mut *transaction)
            .await?;
        sqlx::query("DELETE FROM search_cache")
            .execute(&mut *transaction)
            .await?;
        sqlx::query("DELETE FROM credential_usage")
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;
        Ok(())
    }
}

fn count_column(row: &SqliteRow, column: &str) -> u64 {
    row.try_get::<i64, _>(column).unwrap_or(0).max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use crate::database::Database;
    use crate::models::Provenance;
    use chrono::{Duration, NaiveDate};

    fn record(id: &str) -> ResultRecord {
        ResultRecord {
            video_id: id.to_string(),
            title: format!("Song {id}"),
            description: "desc".to_string(),
            channel_title: "Channel".to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
            published_at: Utc::now(),
            duration: "00:00:00".to_string(),
            view_count: 0,
            provenance: Provenance::FromUpstream,
        }
    }

    async fn setup() -> (Database, ResultCache) {
        let db = Database::in_memory().await.unwrap();
        let cache = ResultCache::new(db.pool());
        (db, cache)
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Foo Bar "), normalize_query("foo bar"));
        assert_eq!(normalize_query("\tMIXED Case\n"), "mixed case");
        assert_eq!(normalize_query(""), "");

        for raw in ["  Foo Bar ", "ÄÖÜ Straße", "", "   ", "already normal"] {
            let once = normalize_query(raw);
            assert_eq!(normalize_query(&once), once);
        }
    }

    #[tokio::test]
    async fn test_store_then_lookup_by_equivalent_query() {
        let (_db, cache) = setup().await;
        cache
            .store_results("Bohemian Rhapsody", &[record("a"), record("b")])
            .await;

        let hit = cache.lookup_results("  bohemian RHAPSODY ").await;
        assert_eq!(hit.len(), 2);
        assert_eq!(hit[0].video_id, "a");

        let entry = cache.lookup_entry("bohemian rhapsody").await.unwrap();
        assert_eq!(entry.normalized_query, "bohemian rhapsody");
    }

    #[tokio::test]
    async fn test_store_overwrites_in_place() {
        let (db, cache) = setup().await;
        cache.store_results("q", &[record("old")]).await;
        cache.store_results("Q", &[record("new1"), record("new2")]).await;

        let hit = cache.lookup_results("q").await;
        assert_eq!(
            hit.iter().map(|r| r.video_id.as_str()).collect::<Vec<_>>(),
            vec!["new1", "new2"]
        );

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_cache")
            .fetch_one(&db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_stored() {
        let (_db, cache) = setup().await;
        cache.store_results("nothing", &[]).await;
        assert!(cache.lookup_results("nothing").await.is_empty());
        assert_eq!(cache.stats().await.search_entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_miss() {
        let (db, cache) = setup().await;
        sqlx::query("INSERT INTO search_cache (normalized_query, results, created_at) VALUES ('bad', 'not json', '2024-01-01T00:00:00Z')")
            .execute(&db.pool())
            .await
            .unwrap();

        assert!(cache.lookup_results("bad").await.is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_round_trip_and_guards() {
        let (_db, cache) = setup().await;
        let url = "https://i.ytimg.com/vi/x/hqdefault.jpg";

        assert!(cache.lookup_thumbnail(url).await.is_none());

        cache.store_thumbnail(url, &[1, 2, 3]).await;
        cache.store_thumbnail(url, &[4, 5]).await;
        cache.store_thumbnail("", &[9]).await;
        cache.store_thumbnail("https://empty", &[]).await;

        assert_eq!(cache.lookup_thumbnail(url).await, Some(vec![4, 5]));
        assert!(cache.lookup_thumbnail("https://empty").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.thumbnail_entries, 1);
        assert_eq!(stats.thumbnail_bytes, 2);
    }

    #[tokio::test]
    async fn test_clear_wipes_caches_and_usage() {
        let (db, cache) = setup().await;
        let ledger = UsageLedger::new(db.pool());
        let key = Credential::new("k");
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        cache.store_results("q", &[record("a")]).await;
        cache.store_thumbnail("https://t", &[1]).await;
        ledger.increment_call_count(&key, day).await;
        ledger.mark_exhausted(&key, day).await;

        assert!(cache.clear(&ledger).await);

        assert!(cache.lookup_results("q").await.is_empty());
        assert!(cache.lookup_thumbnail("https://t").await.is_none());
        assert_eq!(ledger.get_call_count(&key, day).await, 0);
        assert!(!ledger.is_exhausted(&key, day).await);
    }

    #[tokio::test]
    async fn test_prune_search_results_older_than() {
        let (db, cache) = setup().await;
        cache.store_results("fresh", &[record("a")]).await;
        let old = format_timestamp(Utc::now() - Duration::days(40));
        sqlx::query("INSERT INTO search_cache (normalized_query, results, created_at) VALUES ('stale', '[]', ?)")
            .bind(old)
            .execute(&db.pool())
            .await
            .unwrap();

        let removed = cache
            .prune_search_results_older_than(Utc::now() - Duration::days(30))
            .await;

        assert_eq!(removed, 1);
        assert_eq!(cache.lookup_results("fresh").await.len(), 1);
    }
}
