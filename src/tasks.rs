//! Entry points shared by the HTTP surface and the background scheduler.
//!
//! Both paths funnel through here so cache invalidation stays in one place:
//! any sync or aggregation event for a tenant drops that tenant's cached
//! metrics.

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::aggregate::{AggregationReport, MetricsAggregator, PeriodType};
use crate::config::SyncConfig;
use crate::crypto::CryptoKey;
use crate::error::SyncError;
use crate::query::MetricsCache;
use crate::repositories::TenantRepository;
use crate::sync::{MetricsSyncEngine, SyncReport};

/// Sync one tenant and invalidate its cached metrics.
#[instrument(skip(db, config, crypto_key, cache), fields(tenant_id = %tenant_id))]
pub async fn sync_tenant(
    db: &DatabaseConnection,
    config: &SyncConfig,
    crypto_key: Option<&CryptoKey>,
    cache: &MetricsCache,
    tenant_id: Uuid,
) -> Result<SyncReport, SyncError> {
    let engine = MetricsSyncEngine::new(db, config, crypto_key);
    let report = engine.sync_tenant(tenant_id).await?;

    if !report.skipped_locked {
        cache.invalidate_tenant(tenant_id);
    }
    Ok(report)
}

/// Compute aggregations for the given date across all tenants, then
/// invalidate every tenant's cached metrics. With no `period_type` all three
/// granularities run.
#[instrument(skip(db, cache))]
pub async fn compute_aggregations(
    db: &DatabaseConnection,
    cache: &MetricsCache,
    date: NaiveDate,
    period_type: Option<PeriodType>,
) -> Result<AggregationReport, SyncError> {
    let aggregator = MetricsAggregator::new(db);

    let mut report = match period_type {
        Some(PeriodType::Daily) | None => aggregator.compute_daily_aggregations(date).await?,
        Some(PeriodType::Weekly) => aggregator.compute_weekly_aggregations(date).await?,
        Some(PeriodType::Monthly) => aggregator.compute_monthly_aggregations(date).await?,
    };

    if period_type.is_none() {
        let weekly = aggregator.compute_weekly_aggregations(date).await?;
        let monthly = aggregator.compute_monthly_aggregations(date).await?;
        report.aggregations_computed +=
            weekly.aggregations_computed + monthly.aggregations_computed;
        report.errors.extend(weekly.errors);
        report.errors.extend(monthly.errors);
    }

    let tenants = TenantRepository::new(db);
    for tenant in tenants.list_tenants().await? {
        cache.invalidate_tenant(tenant.id);
    }

    Ok(report)
}
