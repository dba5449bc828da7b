//! Periodic storage housekeeping
//!
//! Quota reset needs no job: a new UTC day is a new ledger key. This only
//! keeps the store from growing without bound by pruning past-day usage
//! records and, when configured, stale search-cache entries.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MaintenanceConfig;
use crate::repositories::{ResultCache, UsageLedger};
use crate::utils::DayClock;

/// Rows removed by one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub usage_records_pruned: u64,
    pub search_entries_pruned: u64,
}

pub struct MaintenanceScheduler {
    schedule: Schedule,
    ledger: UsageLedger,
    cache: ResultCache,
    clock: Arc<dyn DayClock>,
    usage_retention_days: u32,
    search_cache_max_age_days: Option<u32>,
}

impl MaintenanceScheduler {
    pub fn new(
        config: &MaintenanceConfig,
        ledger: UsageLedger,
        cache: ResultCache,
        clock: Arc<dyn DayClock>,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(&config.prune_cron)
            .with_context(|| format!("Invalid maintenance cron '{}'", config.prune_cron))?;

        Ok(Self {
            schedule,
            ledger,
            cache,
            clock,
            usage_retention_days: config.usage_retention_days,
            search_cache_max_age_days: config.search_cache_max_age_days,
        })
    }

    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// One pass: prune usage older than the retention window and, if set, stale searches
    pub async fn run_once(&self) -> MaintenanceReport {
        let today = self.clock.today();
        let cutoff_day = today - Duration::days(i64::from(self.usage_retention_days));
        let usage_records_pruned = self.ledger.prune_before(cutoff_day).await;

        let search_entries_pruned = match self.search_cache_max_age_days {
            Some(days) => {
                self.cache
                    .prune_search_results_older_than(Utc::now() - Duration::days(i64::from(days)))
                    .await
            }
            None => 0,
        };

        let report = MaintenanceReport {
            usage_records_pruned,
            search_entries_pruned,
        };
        info!(
            usage_records_pruned = report.usage_records_pruned,
            search_entries_pruned = report.search_entries_pruned,
            "Maintenance pass completed"
        );
        report
    }

    /// Run passes on the cron schedule until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting maintenance scheduler");

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                warn!("Maintenance schedule has no upcoming runs; stopping");
                return;
            };
            debug!("Next maintenance pass at {}", next);

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Maintenance scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    self.run_once().await;
                }
            }
        }
    }
}
