//! Durable per-credential, per-day call counters and exhaustion flags
//!
//! Every public operation fails softly: store errors are logged and a safe
//! default is returned (0 calls, not exhausted, empty snapshot). Missing or
//! stale usage data is treated as "no usage yet", so the ledger can never be
//! the reason a search does not run.

use chrono::{NaiveDate, Utc};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::credentials::Credential;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{UsageEvent, UsageRecord};
use crate::utils::datetime::{day_key, format_timestamp};

pub type UsageEventSender = broadcast::Sender<UsageEvent>;
pub type UsageEventReceiver = broadcast::Receiver<UsageEvent>;

#[derive(Clone)]
pub struct UsageLedger {
    pool: Pool<Sqlite>,
    events: UsageEventSender,
}

impl UsageLedger {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { pool, events }
    }

    /// Live feed of count and exhaustion changes for diagnostics displays
    pub fn subscribe(&self) -> UsageEventReceiver {
        self.events.subscribe()
    }

    /// Count one call and return the new total (0 if the write failed)
    pub async fn increment_call_count(&self, credential: &Credential, day: NaiveDate) -> u32 {
        match self.try_increment(credential, day).await {
            Ok(count) => {
                debug!(
                    credential = %credential,
                    day = %day,
                    count,
                    "API call counted"
                );
                let _ = self.events.send(UsageEvent::CallCounted {
                    fingerprint: credential.fingerprint(),
                    day,
                    call_count: count,
                });
                count
            }
            Err(e) => {
                error!(credential = %credential, "Failed to increment API call count: {}", e);
                0
            }
        }
    }

    pub async fn get_call_count(&self, credential: &Credential, day: NaiveDate) -> u32 {
        match self.try_get_record(credential, day).await {
            Ok(record) => record.map(|r| r.call_count).unwrap_or(0),
            Err(e) => {
                error!(credential = %credential, "Failed to read API call count: {}", e);
                0
            }
        }
    }

    /// Idempotent; creates the record when absent
    pub async fn mark_exhausted(&self, credential: &Credential, day: NaiveDate) {
        match self.try_mark_exhausted(credential, day).await {
            Ok(()) => {
                info!(credential = %credential, day = %day, "Credential marked exhausted");
                let _ = self.events.send(UsageEvent::Exhausted {
                    fingerprint: credential.fingerprint(),
                    day,
                });
            }
            Err(e) => {
                error!(credential = %credential, "Failed to mark credential exhausted: {}", e);
            }
        }
    }

    pub async fn is_exhausted(&self, credential: &Credential, day: NaiveDate) -> bool {
        match self.try_get_record(credential, day).await {
            Ok(record) => record.map(|r| r.exhausted).unwrap_or(false),
            Err(e) => {
                error!(credential = %credential, "Failed to read exhaustion flag: {}", e);
                false
            }
        }
    }

    pub async fn get_record(&self, credential: &Credential, day: NaiveDate) -> Option<UsageRecord> {
        match self.try_get_record(credential, day).await {
            Ok(record) => record,
            Err(e) => {
                error!(credential = %credential, "Failed to read usage record: {}", e);
                None
            }
        }
    }

    /// Call counts for every credential with a record on `day`
    pub async fn get_all_counts(&self, day: NaiveDate) -> HashMap<String, u32> {
        self.snapshot(day)
            .await
            .into_iter()
            .map(|r| (r.credential, r.call_count))
            .collect()
    }

    /// Exhaustion flags for every credential with a record on `day`
    pub async fn get_all_exhaustion(&self, day: NaiveDate) -> HashMap<String, bool> {
        self.snapshot(day)
            .await
            .into_iter()
            .map(|r| (r.credential, r.exhausted))
            .collect()
    }

    /// Delete records for days before `day`; returns rows removed
    pub async fn prune_before(&self, day: NaiveDate) -> u64 {
        let result = sqlx::query("DELETE FROM credential_usage WHERE usage_day < ?")
            .bind(day_key(day))
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                let removed = done.rows_affected();
                if removed > 0 {
                    info!("Pruned {} usage records older than {}", removed, day);
                }
                removed
            }
            Err(e) => {
                error!("Failed to prune usage records: {}", e);
                0
            }
        }
    }

    pub(crate) fn notify_cleared(&self) {
        let _ = self.events.send(UsageEvent::Cleared);
    }

    async fn try_increment(&self, credential: &Credential, day: NaiveDate) -> RepositoryResult<u32> {
        // fetch_all steps the statement to completion so the write is
        // committed before the count is handed back
        let counts = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO credential_usage (credential, usage_day, call_count, exhausted, updated_at)
            VALUES (?, ?, 1, 0, ?)
            ON CONFLICT(credential, usage_day)
            DO UPDATE SET call_count = call_count + 1, updated_at = excluded.updated_at
            RETURNING call_count
            "#,
        )
        .bind(credential.secret())
        .bind(day_key(day))
        .bind(format_timestamp(Utc::now()))
        .fetch_all(&self.pool)
        .await?;

        let count = counts
            .first()
            .copied()
            .ok_or_else(|| RepositoryError::query_failed("increment_call_count", "upsert returned no row"))?;
        Ok(clamp_count(count))
    }

    async fn try_mark_exhausted(&self, credential: &Credential, day: NaiveDate) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credential_usage (credential, usage_day, call_count, exhausted, updated_at)
            VALUES (?, ?, 0, 1, ?)
            ON CONFLICT(credential, usage_day)
            DO UPDATE SET exhausted = 1, updated_at = excluded.updated_at
            "#,
        )
        .bind(credential.secret())
        .bind(day_key(day))
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_get_record(
        &self,
        credential: &Credential,
        day: NaiveDate,
    ) -> RepositoryResult<Option<UsageRecord>> {
        let row = sqlx::query(
            "SELECT call_count, exhausted FROM credential_usage WHERE credential = ? AND usage_day = ?",
        )
        .bind(credential.secret())
        .bind(day_key(day))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UsageRecord {
            credential: credential.secret().to_string(),
            day,
            call_count: clamp_count(row.try_get::<i64, _>("call_count")?),
            exhausted: row.try_get::<i64, _>("exhausted")? != 0,
        }))
    }

    /// Best effort: rows that fail to decode are skipped, a failed query yields nothing
    async fn snapshot(&self, day: NaiveDate) -> Vec<UsageRecord> {
        let rows = sqlx::query(
            "SELECT credential, call_count, exhausted FROM credential_usage WHERE usage_day = ?",
        )
        .bind(day_key(day))
        .fetch_all(&self.pool)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to read usage snapshot for {}: {}", day, e);
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let decoded = (|| -> Result<UsageRecord, sqlx::Error> {
                Ok(UsageRecord {
                    credential: row.try_get("credential")?,
                    day,
                    call_count: clamp_count(row.try_get::<i64, _>("call_count")?),
                    exhausted: row.try_get::<i64, _>("exhausted")? != 0,
                })
            })();

            match decoded {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping undecodable usage row: {}", e),
            }
        }
        records
    }
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
