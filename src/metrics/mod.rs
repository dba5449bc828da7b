use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::models::Provenance;

/// Point-in-time copy of the search counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchMetricsSnapshot {
    pub cache_hits: u64,
    pub upstream_successes: u64,
    pub failed_attempts: u64,
    pub skipped_attempts: u64,
    pub rotations: u64,
    pub synthetic_fallbacks: u64,
    pub pool_exhaustions: u64,
}

/// Process-lifetime search counters
///
/// Counters are plain atomics; the only consistency offered is per field.
#[derive(Debug, Default)]
pub struct SearchMetrics {
    cache_hits: AtomicU64,
    upstream_successes: AtomicU64,
    failed_attempts: AtomicU64,
    skipped_attempts: AtomicU64,
    rotations: AtomicU64,
    synthetic_fallbacks: AtomicU64,
    pool_exhaustions: AtomicU64,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log one answered search and count it under its provenance
    pub fn record_outcome(
        &self,
        query: &str,
        provenance: Provenance,
        result_count: usize,
        attempts: usize,
    ) {
        let counter = match provenance {
            Provenance::FromCache => &self.cache_hits,
            Provenance::FromUpstream => &self.upstream_successes,
            Provenance::Synthetic => &self.synthetic_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        info!(
            query = %query,
            source = provenance.label(),
            results = result_count,
            attempts,
            "Search answered"
        );
    }

    /// A live attempt that concluded without usable results
    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// A credential passed over without a network call
    pub fn record_skipped_attempt(&self) {
        self.skipped_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_exhausted(&self, query: &str, attempted: usize) {
        self.pool_exhaustions.fetch_add(1, Ordering::Relaxed);
        info!(
            query = %query,
            attempted,
            "Search failed: every credential exhausted or failing"
        );
    }

    pub fn snapshot(&self) -> SearchMetricsSnapshot {
        SearchMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            upstream_successes: self.upstream_successes.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            skipped_attempts: self.skipped_attempts.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            synthetic_fallbacks: self.synthetic_fallbacks.load(Ordering::Relaxed),
            pool_exhaustions: self.pool_exhaustions.load(Ordering::Relaxed),
        }
    }
}
