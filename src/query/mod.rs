//! Metrics read path.
//!
//! All-time totals always come straight from raw execution and workflow
//! facts, never from aggregations, so they cannot get stuck behind a missed
//! aggregation run. Trend figures come from aggregation rows, since
//! recomputing multi-period comparisons from raw facts per request would be
//! prohibitively expensive. A short-TTL cache fronts both.

pub mod cache;

pub use cache::{CacheKey, MetricsCache};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::aggregate::{MetricsTrend, PeriodType};
use crate::error::SyncError;
use crate::models::metrics_aggregation::Model as AggregationModel;
use crate::repositories::{
    AggregationRepository, ExecutionRepository, TenantRepository, WorkflowRepository,
};
use crate::sync::SyncStateRepository;

/// Headline metrics for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsSummary {
    pub tenant_id: Uuid,
    /// All workflow and execution totals below are computed from raw facts.
    pub total_workflows: u64,
    pub active_workflows: u64,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Percent of production executions that succeeded, all time.
    pub success_rate: f64,
    /// Day-over-day movement, absent until two daily aggregations exist.
    pub trend: Option<MetricsTrend>,
    /// Whether the last sync attempt completed without error.
    pub connection_healthy: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

/// Shape of one history lookup: granularity, optional workflow scope, an
/// optional inclusive date range over period starts, and a point limit.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub period_type: PeriodType,
    pub workflow_id: Option<Uuid>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: u64,
}

/// One historical aggregation row, shaped for chart rendering.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsHistoryPoint {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_executions: i64,
    pub successful_executions: i64,
    pub failed_executions: i64,
    pub success_rate: f64,
    pub avg_execution_time_ms: Option<f64>,
    pub time_saved_hours: f64,
    pub productivity_score: f64,
}

impl From<AggregationModel> for MetricsHistoryPoint {
    fn from(row: AggregationModel) -> Self {
        Self {
            period_start: row.period_start.with_timezone(&Utc),
            period_end: row.period_end.with_timezone(&Utc),
            total_executions: row.total_executions,
            successful_executions: row.successful_executions,
            failed_executions: row.failed_executions,
            success_rate: row.success_rate,
            avg_execution_time_ms: row.avg_execution_time_ms,
            time_saved_hours: row.time_saved_hours,
            productivity_score: row.productivity_score,
        }
    }
}

/// Read-side service over executions, workflows, and aggregations.
pub struct MetricsQueryService<'a> {
    db: &'a DatabaseConnection,
    cache: &'a MetricsCache,
}

impl<'a> MetricsQueryService<'a> {
    pub fn new(db: &'a DatabaseConnection, cache: &'a MetricsCache) -> Self {
        Self { db, cache }
    }

    /// The tenant's headline metrics, cached per tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn summary(&self, tenant_id: Uuid) -> Result<MetricsSummary, SyncError> {
        let key = CacheKey::new(tenant_id, "summary");
        if let Some(cached) = self.cache.get(&key)
            && let Ok(summary) = serde_json::from_value::<MetricsSummary>(cached)
        {
            debug!(%tenant_id, "metrics summary served from cache");
            return Ok(summary);
        }

        let summary = self.compute_summary(tenant_id).await?;
        if let Ok(value) = serde_json::to_value(&summary) {
            self.cache.insert(key, value);
        }
        Ok(summary)
    }

    /// Aggregation history matching the query, newest first, cached per
    /// tenant and query shape.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, period = query.period_type.as_str()))]
    pub async fn history(
        &self,
        tenant_id: Uuid,
        query: HistoryQuery,
    ) -> Result<Vec<MetricsHistoryPoint>, SyncError> {
        let limit = query.limit.clamp(1, 90);
        let key = CacheKey::new(
            tenant_id,
            format!(
                "history:{}:{}:{}:{}:{}",
                query.period_type.as_str(),
                query
                    .workflow_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "all".to_string()),
                query.start.map(|d| d.to_string()).unwrap_or_default(),
                query.end.map(|d| d.to_string()).unwrap_or_default(),
                limit,
            ),
        );
        if let Some(cached) = self.cache.get(&key)
            && let Ok(points) = serde_json::from_value::<Vec<MetricsHistoryPoint>>(cached)
        {
            return Ok(points);
        }

        TenantRepository::new(self.db)
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or(SyncError::TenantNotFound(tenant_id))?;

        // Inclusive date range over period starts, expressed as a
        // half-open instant range.
        let since = query
            .start
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let until = query
            .end
            .map(|d| d.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::days(1));

        let aggregations = AggregationRepository::new(self.db);
        let points: Vec<MetricsHistoryPoint> = aggregations
            .list_recent(
                tenant_id,
                query.workflow_id,
                query.period_type.as_str(),
                since,
                until,
                limit,
            )
            .await?
            .into_iter()
            .map(MetricsHistoryPoint::from)
            .collect();

        if let Ok(value) = serde_json::to_value(&points) {
            self.cache.insert(key, value);
        }
        Ok(points)
    }

    async fn compute_summary(&self, tenant_id: Uuid) -> Result<MetricsSummary, SyncError> {
        let workflows = WorkflowRepository::new(self.db);
        let executions = ExecutionRepository::new(self.db);
        let aggregations = AggregationRepository::new(self.db);
        let states = SyncStateRepository::new(self.db);

        TenantRepository::new(self.db)
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or(SyncError::TenantNotFound(tenant_id))?;

        let totals = executions.production_totals(tenant_id).await?;
        let total_workflows = workflows.count_by_tenant(tenant_id).await?;
        let active_workflows = workflows.count_active_by_tenant(tenant_id).await?;

        let success_rate = if totals.total > 0 {
            totals.successful as f64 / totals.total as f64 * 100.0
        } else {
            0.0
        };

        let recent = aggregations
            .list_recent(tenant_id, None, PeriodType::Daily.as_str(), None, None, 2)
            .await?;
        // list_recent returns newest first.
        let trend = match recent.as_slice() {
            [current, previous] => Some(MetricsTrend::between(previous, current)),
            _ => None,
        };

        let state = states.get(tenant_id).await?;
        let (connection_healthy, last_sync_at) = match &state {
            Some(state) => (
                state.last_error.is_none(),
                state.last_execution_sync.map(|t| t.with_timezone(&Utc)),
            ),
            None => (false, None),
        };

        Ok(MetricsSummary {
            tenant_id,
            total_workflows,
            active_workflows,
            total_executions: totals.total,
            successful_executions: totals.successful,
            failed_executions: totals.failed,
            success_rate,
            trend,
            connection_healthy,
            last_sync_at,
            computed_at: Utc::now(),
        })
    }
}
