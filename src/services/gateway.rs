//! Search gateway: cache-first lookup with quota-aware credential rotation
//!
//! One call to [`Gateway::search`] walks the credential pool at most once,
//! starting from the shared cursor. Each credential is either skipped without
//! a network call (already exhausted or at its daily ceiling) or tried live.
//! The cursor only moves after an attempt has concluded without results, and
//! never after a success, so a working credential stays current across calls.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::{sanitize_keys, Credential, CredentialPool, CredentialStore, PoolSnapshot};
use crate::errors::{AppResult, GatewayError, GatewayResult};
use crate::metrics::{SearchMetrics, SearchMetricsSnapshot};
use crate::models::{tag_and_truncate, CredentialUsage, Provenance, ResultRecord};
use crate::repositories::{ResultCache, UsageLedger};
use crate::services::synthetic;
use crate::sources::{parse_search_response, SearchTransport, UpstreamResponse};
use crate::utils::{DayClock, SystemClock};

/// What one live attempt did to the rotation
enum AttemptOutcome {
    Answered(Vec<ResultRecord>),
    Rotate,
}

pub struct Gateway {
    pool: Arc<CredentialPool>,
    ledger: UsageLedger,
    cache: ResultCache,
    transport: Arc<dyn SearchTransport>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn DayClock>,
    metrics: Arc<SearchMetrics>,
    daily_quota: u32,
}

impl Gateway {
    pub fn new(
        ledger: UsageLedger,
        cache: ResultCache,
        transport: Arc<dyn SearchTransport>,
        store: Arc<dyn CredentialStore>,
        daily_quota: u32,
    ) -> Self {
        Self {
            pool: Arc::new(CredentialPool::default()),
            ledger,
            cache,
            transport,
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(SearchMetrics::new()),
            daily_quota,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn DayClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pool(mut self, pool: Arc<CredentialPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn daily_quota(&self) -> u32 {
        self.daily_quota
    }

    pub fn metrics(&self) -> SearchMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve `query` to at most `max_results` records
    ///
    /// An empty or whitespace query yields no results. The only failure is
    /// [`GatewayError::ExhaustedPool`], plus [`GatewayError::MalformedResponse`]
    /// when the provider answers 2xx with an unreadable body.
    pub async fn search(&self, query: &str, max_results: u32) -> GatewayResult<Vec<ResultRecord>> {
        self.search_with_cancel(query, max_results, &CancellationToken::new())
            .await
    }

    /// [`Gateway::search`] that aborts when `cancel` fires
    ///
    /// An aborted attempt counts no call and leaves the cursor where it was.
    pub async fn search_with_cancel(
        &self,
        query: &str,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<ResultRecord>> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }
        let limit = max_results as usize;

        let cached = self.cache.lookup_results(query).await;
        if !cached.is_empty() {
            let results = tag_and_truncate(cached, Provenance::FromCache, limit);
            self.metrics
                .record_outcome(query, Provenance::FromCache, results.len(), 0);
            return Ok(results);
        }

        let snapshot = self.pool.snapshot().await;
        if snapshot.is_empty() {
            warn!("No API credentials configured, using synthetic results");
            let results = synthetic::generate_synthetic_results(query, limit);
            self.metrics
                .record_outcome(query, Provenance::Synthetic, results.len(), 0);
            return Ok(results);
        }

        for attempt in 0..snapshot.len() {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            let Some((index, credential)) = snapshot.slot(attempt) else {
                break;
            };
            let day = self.clock.today();

            if self.ledger.is_exhausted(credential, day).await {
                debug!(index, credential = %credential, "Skipping exhausted credential");
                self.metrics.record_skipped_attempt();
                self.rotate_past(&snapshot, index).await;
                continue;
            }

            let call_count = self.ledger.get_call_count(credential, day).await;
            if call_count >= self.daily_quota {
                info!(
                    index,
                    credential = %credential,
                    call_count,
                    quota = self.daily_quota,
                    "Credential reached its daily quota"
                );
                self.ledger.mark_exhausted(credential, day).await;
                self.metrics.record_skipped_attempt();
                self.rotate_past(&snapshot, index).await;
                continue;
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(index, credential = %credential, "Search cancelled mid-request");
                    return Err(GatewayError::Cancelled);
                }
                response = self.transport.search(credential, query, max_results) => response,
            };

            let outcome = match response {
                Ok(response) => {
                    self.conclude_exchange(index, credential, day, response)
                        .await?
                }
                Err(e) => {
                    warn!(index, credential = %credential, "Upstream request failed: {}", e);
                    AttemptOutcome::Rotate
                }
            };

            match outcome {
                AttemptOutcome::Answered(records) => {
                    self.cache.store_results(query, &records).await;
                    let results = tag_and_truncate(records, Provenance::FromUpstream, limit);
                    self.metrics.record_outcome(
                        query,
                        Provenance::FromUpstream,
                        results.len(),
                        attempt + 1,
                    );
                    return Ok(results);
                }
                AttemptOutcome::Rotate => {
                    self.metrics.record_failed_attempt();
                    self.rotate_past(&snapshot, index).await;
                }
            }
        }

        self.metrics.record_pool_exhausted(query, snapshot.len());
        Err(GatewayError::ExhaustedPool {
            attempted: snapshot.len(),
        })
    }

    /// Bookkeeping for a request the provider answered
    async fn conclude_exchange(
        &self,
        index: usize,
        credential: &Credential,
        day: NaiveDate,
        response: UpstreamResponse,
    ) -> GatewayResult<AttemptOutcome> {
        let call_count = self.ledger.increment_call_count(credential, day).await;

        if response.is_success() {
            return match parse_search_response(&response.body) {
                Ok(records) => {
                    debug!(
                        index,
                        credential = %credential,
                        call_count,
                        results = records.len(),
                        "Upstream search succeeded"
                    );
                    Ok(AttemptOutcome::Answered(records))
                }
                Err(e) => {
                    warn!(index, credential = %credential, "Unreadable search response: {}", e);
                    Err(GatewayError::MalformedResponse {
                        message: e.to_string(),
                    })
                }
            };
        }

        if response.is_auth_or_quota_failure() {
            warn!(
                index,
                credential = %credential,
                status = response.status,
                "Credential rejected by provider, marking exhausted"
            );
            self.ledger.mark_exhausted(credential, day).await;
        } else {
            warn!(
                index,
                credential = %credential,
                status = response.status,
                "Upstream returned an error status"
            );
        }
        Ok(AttemptOutcome::Rotate)
    }

    async fn rotate_past(&self, snapshot: &PoolSnapshot, index: usize) {
        if self.pool.advance_past(index, snapshot.generation).await {
            self.metrics.record_rotation();
        }
    }

    /// Placeholder records for explicit test mode; never cached
    pub fn generate_synthetic_results(&self, query: &str, count: usize) -> Vec<ResultRecord> {
        synthetic::generate_synthetic_results(query, count)
    }

    /// Replace the credential list and persist it
    ///
    /// Blank entries are dropped. A list with nothing left is rejected and
    /// the pool keeps its previous state.
    pub async fn set_credentials<I, S>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = sanitize_keys(keys);
        let secrets: Vec<String> = credentials.iter().map(|c| c.secret().to_string()).collect();

        if !self.pool.set_credentials(credentials).await {
            return false;
        }

        if let Err(e) = self.store.save(&secrets).await {
            warn!("Failed to persist API credentials: {}", e);
        }
        true
    }

    /// Prime the pool from the credential store; returns how many keys were loaded
    pub async fn load_credentials(&self) -> AppResult<usize> {
        let credentials = sanitize_keys(self.store.load().await?);
        let count = credentials.len();
        if count == 0 {
            info!("No saved API credentials found");
            return Ok(0);
        }

        self.pool.set_credentials(credentials).await;
        info!("Loaded {} API credentials", count);
        Ok(count)
    }

    pub async fn credentials(&self) -> Vec<Credential> {
        self.pool.credentials().await
    }

    pub async fn current_index(&self) -> usize {
        self.pool.current_index().await
    }

    /// Today's usage for every pool credential, in pool order
    pub async fn usage_snapshot(&self) -> Vec<CredentialUsage> {
        let day = self.clock.today();
        let credentials = self.pool.credentials().await;
        let cursor = self.pool.current_index().await;
        let counts = self.ledger.get_all_counts(day).await;
        let exhaustion = self.ledger.get_all_exhaustion(day).await;

        credentials
            .iter()
            .enumerate()
            .map(|(index, credential)| {
                let call_count = counts.get(credential.secret()).copied().unwrap_or(0);
                CredentialUsage {
                    index,
                    fingerprint: credential.fingerprint(),
                    call_count,
                    exhausted: exhaustion.get(credential.secret()).copied().unwrap_or(false),
                    remaining: self.daily_quota.saturating_sub(call_count),
                    is_current: index == cursor,
                }
            })
            .collect()
    }

    /// Administrative wipe of both caches and the usage ledger
    pub async fn clear_cache(&self) -> bool {
        self.cache.clear(&self.ledger).await
    }
}
