//! # Background Scheduler
//!
//! Periodic driver for tenant syncs and daily rollups. Each tenant gets its
//! own jittered cadence so a fleet of instances polling the same n8n hosts
//! does not hit them in lockstep. Due tenants are synced with bounded
//! concurrency; the per-tenant database lock inside the sync engine keeps
//! overlapping runs from double-processing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use metrics::{counter, gauge, histogram};
use rand::Rng;
use sea_orm::DatabaseConnection;
use tokio::task::JoinSet;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::query::MetricsCache;
use crate::repositories::TenantRepository;
use crate::tasks;

/// Background scheduler service.
pub struct SyncScheduler {
    config: Arc<AppConfig>,
    db: Arc<DatabaseConnection>,
    cache: Arc<MetricsCache>,
    crypto_key: Option<Arc<CryptoKey>>,
    /// Next sync deadline per tenant. In-memory only; a restart re-spreads
    /// the fleet, which the incremental overlap window absorbs.
    next_runs: HashMap<Uuid, DateTime<Utc>>,
    /// Last UTC date for which the daily rollup run completed.
    last_aggregation_date: Option<NaiveDate>,
}

#[derive(Debug, Default)]
struct TickStats {
    tenants_polled: u64,
    syncs_started: u64,
    syncs_skipped_locked: u64,
    sync_errors: u64,
}

impl SyncScheduler {
    /// Create a new scheduler instance.
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        cache: Arc<MetricsCache>,
        crypto_key: Option<Arc<CryptoKey>>,
    ) -> Self {
        Self {
            config,
            db,
            cache,
            crypto_key,
            next_runs: HashMap::new(),
            last_aggregation_date: None,
        }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting scheduler");
        let tick_interval = TokioDuration::from_secs(self.config.scheduler.tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let tick_started = Instant::now();
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!(error = ?err, "Scheduler tick failed");
                    }
                    let elapsed = tick_started.elapsed();
                    histogram!("scheduler_tick_duration_ms")
                        .record(elapsed.as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Scheduler stopped");
    }

    async fn tick(&mut self, now: DateTime<Utc>) -> Result<(), crate::error::SyncError> {
        let mut stats = TickStats::default();

        let tenants = TenantRepository::new(self.db.as_ref()).list_tenants().await?;
        let known_ids: Vec<Uuid> = tenants.iter().map(|tenant| tenant.id).collect();
        self.next_runs.retain(|id, _| known_ids.contains(id));

        let mut due = Vec::new();
        for tenant in &tenants {
            stats.tenants_polled += 1;
            match self.next_runs.get(&tenant.id) {
                // New tenants get a first run within one jittered interval so
                // simultaneous registrations do not all fire at once.
                None => {
                    let first_run = now + self.jittered_delay(true);
                    debug!(tenant_id = %tenant.id, %first_run, "Scheduling first sync");
                    self.next_runs.insert(tenant.id, first_run);
                }
                Some(deadline) if *deadline <= now => due.push(tenant.id),
                Some(_) => {}
            }
        }

        gauge!("scheduler_tracked_tenants").set(self.next_runs.len() as f64);

        if !due.is_empty() {
            self.run_due_syncs(&due, &mut stats).await;
            for tenant_id in &due {
                self.next_runs.insert(*tenant_id, now + self.jittered_delay(false));
            }
        }

        self.maybe_run_aggregations(now).await;

        debug!(
            polled = stats.tenants_polled,
            started = stats.syncs_started,
            skipped_locked = stats.syncs_skipped_locked,
            errors = stats.sync_errors,
            "Scheduler tick completed"
        );

        Ok(())
    }

    /// Sync every due tenant, at most `scheduler.concurrency` at a time.
    async fn run_due_syncs(&self, due: &[Uuid], stats: &mut TickStats) {
        let concurrency = self.config.scheduler.concurrency.max(1);
        let mut set: JoinSet<(Uuid, Result<bool, crate::error::SyncError>)> = JoinSet::new();

        for &tenant_id in due {
            while set.len() >= concurrency {
                self.collect_sync_result(&mut set, stats).await;
            }

            let db = Arc::clone(&self.db);
            let cache = Arc::clone(&self.cache);
            let crypto_key = self.crypto_key.clone();
            let sync_config = self.config.sync.clone();
            stats.syncs_started += 1;

            set.spawn(async move {
                let result = tasks::sync_tenant(
                    db.as_ref(),
                    &sync_config,
                    crypto_key.as_deref(),
                    cache.as_ref(),
                    tenant_id,
                )
                .await
                .map(|report| report.skipped_locked);
                (tenant_id, result)
            });
        }

        while !set.is_empty() {
            self.collect_sync_result(&mut set, stats).await;
        }
    }

    async fn collect_sync_result(
        &self,
        set: &mut JoinSet<(Uuid, Result<bool, crate::error::SyncError>)>,
        stats: &mut TickStats,
    ) {
        match set.join_next().await {
            Some(Ok((tenant_id, Ok(skipped_locked)))) => {
                if skipped_locked {
                    stats.syncs_skipped_locked += 1;
                    debug!(%tenant_id, "Scheduled sync skipped; another run holds the lock");
                }
            }
            Some(Ok((tenant_id, Err(err)))) => {
                stats.sync_errors += 1;
                warn!(%tenant_id, error = %err, "Scheduled sync failed");
            }
            Some(Err(join_err)) => {
                stats.sync_errors += 1;
                error!(error = ?join_err, "Sync task panicked");
            }
            None => {}
        }
    }

    /// Run the daily/weekly/monthly rollups once per UTC day, after the
    /// configured hour has passed.
    async fn maybe_run_aggregations(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.last_aggregation_date == Some(today)
            || now.hour() < self.config.scheduler.aggregation_hour_utc
        {
            return;
        }

        // Aggregate yesterday's completed day; today's partial data is
        // served from raw facts by the query service.
        let reference = today - Duration::days(1);
        info!(date = %reference, "Running scheduled aggregations");

        match tasks::compute_aggregations(self.db.as_ref(), self.cache.as_ref(), reference, None)
            .await
        {
            Ok(report) => {
                counter!("scheduler_aggregation_runs_total", "outcome" => "ok").increment(1);
                info!(
                    aggregations = report.aggregations_computed,
                    trends = report.trends_computed,
                    errors = report.errors.len(),
                    "Scheduled aggregation run completed"
                );
                self.last_aggregation_date = Some(today);
            }
            Err(err) => {
                counter!("scheduler_aggregation_runs_total", "outcome" => "error").increment(1);
                error!(error = %err, "Scheduled aggregation run failed");
            }
        }
    }

    /// A sync interval with random jitter applied. The first run for a tenant
    /// uses the jitter span alone so startup work is spread, not delayed by a
    /// full interval.
    fn jittered_delay(&self, first_run: bool) -> Duration {
        let scheduler = &self.config.scheduler;
        let base = scheduler.sync_interval_seconds as f64;
        let jitter_pct = rand::thread_rng()
            .gen_range(scheduler.jitter_pct_min..=scheduler.jitter_pct_max.max(scheduler.jitter_pct_min));

        let seconds = if first_run {
            base * jitter_pct
        } else {
            base * (1.0 + jitter_pct)
        };

        Duration::milliseconds((seconds * 1_000.0) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn scheduler_for_tests(jitter_min: f64, jitter_max: f64) -> SyncScheduler {
        let mut config = AppConfig::default();
        config.scheduler.sync_interval_seconds = 900;
        config.scheduler.jitter_pct_min = jitter_min;
        config.scheduler.jitter_pct_max = jitter_max;

        SyncScheduler::new(
            Arc::new(config),
            Arc::new(DatabaseConnection::default()),
            Arc::new(MetricsCache::new(&CacheConfig::default())),
            None,
        )
    }

    #[test]
    fn repeat_delay_stays_within_jitter_band() {
        let scheduler = scheduler_for_tests(0.0, 0.2);
        for _ in 0..50 {
            let delay = scheduler.jittered_delay(false);
            assert!(delay >= Duration::seconds(900));
            assert!(delay <= Duration::seconds(1080));
        }
    }

    #[test]
    fn first_run_is_spread_not_deferred() {
        let scheduler = scheduler_for_tests(0.0, 0.2);
        for _ in 0..50 {
            let delay = scheduler.jittered_delay(true);
            assert!(delay >= Duration::zero());
            assert!(delay <= Duration::seconds(180));
        }
    }

    #[test]
    fn zero_jitter_yields_exact_interval() {
        let scheduler = scheduler_for_tests(0.0, 0.0);
        assert_eq!(scheduler.jittered_delay(false), Duration::seconds(900));
        assert_eq!(scheduler.jittered_delay(true), Duration::zero());
    }
}
