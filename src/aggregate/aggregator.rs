//! Idempotent metric rollup computation.
//!
//! Aggregations are derived entirely from persisted execution facts, so any
//! period can be recomputed at any time. Rollups upsert by their period key
//! and nightly re-aggregation of recent days catches executions that synced
//! late.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::aggregate::period::PeriodType;
use crate::error::SyncError;
use crate::models::execution::Model as ExecutionModel;
use crate::models::metrics_aggregation::Model as AggregationModel;
use crate::repositories::{
    AggregationRepository, ExecutionRepository, TenantRepository, WorkflowRepository,
    aggregation::AggregationValues,
};

/// Longest error string considered when picking the most common error.
const ERROR_TRUNCATE_LEN: usize = 100;

/// Outcome of one batch aggregation run.
#[derive(Debug, Clone, Default, serde::Serialize, utoipa::ToSchema)]
pub struct AggregationReport {
    /// Aggregation rows written or refreshed.
    pub aggregations_computed: u64,
    /// Daily workflow trend snapshots written.
    pub trends_computed: u64,
    /// Per-tenant failures; the batch continues past them.
    pub errors: Vec<String>,
}

/// Computes metric rollups from raw execution facts.
pub struct MetricsAggregator<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Compute or refresh the aggregation for one exact period key.
    ///
    /// Returns `None` when the period has no production executions and no
    /// prior aggregation row exists; empty rows are never created. When a
    /// row exists but the period is now empty, only `computed_at` is
    /// refreshed.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, period_type = period_type.as_str()))]
    pub async fn compute_period(
        &self,
        tenant_id: Uuid,
        workflow_id: Option<Uuid>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        period_type: PeriodType,
    ) -> Result<Option<AggregationModel>, SyncError> {
        let aggregations = AggregationRepository::new(self.db);
        let executions = ExecutionRepository::new(self.db);
        let workflows = WorkflowRepository::new(self.db);

        let existing = aggregations
            .find_by_period_key(tenant_id, workflow_id, period_type.as_str(), period_start)
            .await?;

        let facts = executions
            .list_production_in_period(tenant_id, workflow_id, period_start, period_end)
            .await?;

        if facts.is_empty() {
            return match existing {
                Some(row) => Ok(Some(aggregations.touch_computed_at(row).await?)),
                None => Ok(None),
            };
        }

        // Per-workflow configured savings differ, so they are looked up
        // individually rather than assumed uniform.
        let minutes_by_workflow: HashMap<Uuid, i32> = workflows
            .list_by_tenant(tenant_id)
            .await?
            .into_iter()
            .map(|wf| (wf.id, wf.time_saved_per_execution_minutes))
            .collect();

        let mut values = compute_values(&facts, &minutes_by_workflow);

        if workflow_id.is_none() {
            values.total_workflows = Some(workflows.count_by_tenant(tenant_id).await? as i64);
            values.active_workflows =
                Some(workflows.count_active_by_tenant(tenant_id).await? as i64);
        }

        let row = aggregations
            .upsert(
                tenant_id,
                workflow_id,
                period_type.as_str(),
                period_start,
                period_end,
                values,
            )
            .await?;
        counter!("aggregations_computed_total", "period" => period_type.as_str()).increment(1);

        Ok(Some(row))
    }

    /// Compute daily aggregations for every tenant: one tenant-wide row, one
    /// row per active workflow, and the daily workflow trend snapshots.
    pub async fn compute_daily_aggregations(
        &self,
        date: NaiveDate,
    ) -> Result<AggregationReport, SyncError> {
        self.compute_batch(PeriodType::Daily, date, true).await
    }

    /// Compute weekly aggregations for the week containing `date`.
    pub async fn compute_weekly_aggregations(
        &self,
        date: NaiveDate,
    ) -> Result<AggregationReport, SyncError> {
        self.compute_batch(PeriodType::Weekly, date, false).await
    }

    /// Compute monthly aggregations for the month containing `date`.
    pub async fn compute_monthly_aggregations(
        &self,
        date: NaiveDate,
    ) -> Result<AggregationReport, SyncError> {
        self.compute_batch(PeriodType::Monthly, date, false).await
    }

    async fn compute_batch(
        &self,
        period_type: PeriodType,
        date: NaiveDate,
        with_trends: bool,
    ) -> Result<AggregationReport, SyncError> {
        let tenants = TenantRepository::new(self.db);
        let mut report = AggregationReport::default();

        for tenant in tenants.list_tenants().await? {
            if let Err(err) = self
                .compute_tenant_batch(tenant.id, period_type, date, with_trends, &mut report)
                .await
            {
                warn!(tenant_id = %tenant.id, error = %err, "aggregation failed for tenant");
                report
                    .errors
                    .push(format!("tenant {}: {}", tenant.id, err));
            }
        }

        Ok(report)
    }

    async fn compute_tenant_batch(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
        with_trends: bool,
        report: &mut AggregationReport,
    ) -> Result<(), SyncError> {
        let workflows = WorkflowRepository::new(self.db);
        let (period_start, period_end) = period_type.bounds(date);

        if self
            .compute_period(tenant_id, None, period_start, period_end, period_type)
            .await?
            .is_some()
        {
            report.aggregations_computed += 1;
        }

        for workflow in workflows.list_active_by_tenant(tenant_id).await? {
            if self
                .compute_period(
                    tenant_id,
                    Some(workflow.id),
                    period_start,
                    period_end,
                    period_type,
                )
                .await?
                .is_some()
            {
                report.aggregations_computed += 1;
            }

            if with_trends
                && self
                    .compute_workflow_trend(tenant_id, workflow.id, date)
                    .await?
            {
                report.trends_computed += 1;
            }
        }

        debug!(
            %tenant_id,
            period = period_type.as_str(),
            computed = report.aggregations_computed,
            "tenant aggregation batch done"
        );
        Ok(())
    }

    /// Write the daily trend snapshot for one workflow. Returns whether a
    /// snapshot was written.
    async fn compute_workflow_trend(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool, SyncError> {
        let aggregations = AggregationRepository::new(self.db);
        let executions = ExecutionRepository::new(self.db);
        let workflows = WorkflowRepository::new(self.db);

        let (start, end) = PeriodType::Daily.bounds(date);
        let facts = executions
            .list_production_in_period(tenant_id, Some(workflow_id), start, end)
            .await?;
        if facts.is_empty() {
            return Ok(false);
        }

        let minutes = workflows
            .list_by_tenant(tenant_id)
            .await?
            .into_iter()
            .find(|wf| wf.id == workflow_id)
            .map(|wf| wf.time_saved_per_execution_minutes)
            .unwrap_or(0);

        let execution_count = facts.len() as i64;
        let success_count = facts.iter().filter(|e| e.status == "success").count() as i64;
        let failure_count = facts
            .iter()
            .filter(|e| matches!(e.status.as_str(), "error" | "crashed"))
            .count() as i64;
        let durations: Vec<i64> = facts.iter().filter_map(|e| e.execution_time_ms).collect();
        let avg_execution_time_ms = (!durations.is_empty())
            .then(|| durations.iter().sum::<i64>() as f64 / durations.len() as f64);
        let time_saved_hours = success_count as f64 * minutes as f64 / 60.0;

        aggregations
            .upsert_workflow_trend(
                tenant_id,
                workflow_id,
                date,
                execution_count,
                success_count,
                failure_count,
                avg_execution_time_ms,
                time_saved_hours,
            )
            .await?;
        Ok(true)
    }
}

/// Fold a period's execution facts into aggregation values.
fn compute_values(
    facts: &[ExecutionModel],
    minutes_by_workflow: &HashMap<Uuid, i32>,
) -> AggregationValues {
    let total = facts.len() as i64;
    let successful = facts.iter().filter(|e| e.status == "success").count() as i64;
    let failed = facts
        .iter()
        .filter(|e| matches!(e.status.as_str(), "error" | "crashed"))
        .count() as i64;
    let canceled = facts.iter().filter(|e| e.status == "canceled").count() as i64;
    let success_rate = successful as f64 / total as f64 * 100.0;

    let durations: Vec<i64> = facts.iter().filter_map(|e| e.execution_time_ms).collect();
    let (min_ms, avg_ms, max_ms) = if durations.is_empty() {
        (None, None, None)
    } else {
        (
            durations.iter().min().copied(),
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64),
            durations.iter().max().copied(),
        )
    };

    let sizes: Vec<i64> = facts.iter().filter_map(|e| e.data_size_bytes).collect();
    let (total_size, avg_size) = if sizes.is_empty() {
        (None, None)
    } else {
        let sum = sizes.iter().sum::<i64>();
        (Some(sum), Some(sum as f64 / sizes.len() as f64))
    };

    let time_saved_hours: f64 = facts
        .iter()
        .filter(|e| e.status == "success")
        .map(|e| {
            minutes_by_workflow
                .get(&e.workflow_id)
                .copied()
                .unwrap_or(0) as f64
                / 60.0
        })
        .sum();

    let productivity_score = (success_rate * (total as f64 / 10.0)).min(100.0);

    AggregationValues {
        total_executions: total,
        successful_executions: successful,
        failed_executions: failed,
        canceled_executions: canceled,
        success_rate,
        min_execution_time_ms: min_ms,
        avg_execution_time_ms: avg_ms,
        max_execution_time_ms: max_ms,
        total_data_size_bytes: total_size,
        avg_data_size_bytes: avg_size,
        most_common_error: most_common_error(facts),
        time_saved_hours,
        productivity_score,
        total_workflows: None,
        active_workflows: None,
    }
}

/// The mode of the truncated error strings across failed executions.
fn most_common_error(facts: &[ExecutionModel]) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for error in facts.iter().filter_map(|e| e.error_message.as_deref()) {
        let truncated: String = error.chars().take(ERROR_TRUNCATE_LEN).collect();
        *counts.entry(truncated).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(error, _)| error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fact(workflow_id: Uuid, status: &str, duration: Option<i64>, error: Option<&str>) -> ExecutionModel {
        ExecutionModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            workflow_id,
            remote_execution_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            mode: "webhook".to_string(),
            finished: true,
            started_at: Some(Utc::now().into()),
            stopped_at: Some(Utc::now().into()),
            execution_time_ms: duration,
            is_production: true,
            error_message: error.map(str::to_string),
            data_size_bytes: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn values_count_statuses_and_rates() {
        let wf = Uuid::new_v4();
        let facts = vec![
            fact(wf, "success", Some(100), None),
            fact(wf, "success", Some(300), None),
            fact(wf, "error", Some(50), Some("boom")),
            fact(wf, "canceled", None, None),
        ];
        let minutes = HashMap::from([(wf, 30)]);

        let values = compute_values(&facts, &minutes);
        assert_eq!(values.total_executions, 4);
        assert_eq!(values.successful_executions, 2);
        assert_eq!(values.failed_executions, 1);
        assert_eq!(values.canceled_executions, 1);
        assert_eq!(values.success_rate, 50.0);
        assert_eq!(values.min_execution_time_ms, Some(50));
        assert_eq!(values.max_execution_time_ms, Some(300));
        assert_eq!(values.avg_execution_time_ms, Some(150.0));
        assert_eq!(values.most_common_error.as_deref(), Some("boom"));
    }

    #[test]
    fn time_saved_uses_per_workflow_minutes() {
        let wf_a = Uuid::new_v4();
        let wf_b = Uuid::new_v4();
        let facts = vec![
            fact(wf_a, "success", None, None),
            fact(wf_b, "success", None, None),
            // Failures save nothing.
            fact(wf_a, "error", None, Some("x")),
        ];
        let minutes = HashMap::from([(wf_a, 30), (wf_b, 90)]);

        let values = compute_values(&facts, &minutes);
        assert_eq!(values.time_saved_hours, 0.5 + 1.5);
    }

    #[test]
    fn productivity_score_rewards_volume_and_is_capped() {
        let wf = Uuid::new_v4();
        // 2 executions, 100% success: 100 * 0.2 = 20.
        let facts: Vec<_> = (0..2).map(|_| fact(wf, "success", None, None)).collect();
        let values = compute_values(&facts, &HashMap::new());
        assert_eq!(values.productivity_score, 20.0);

        // 50 executions, 100% success: capped at 100.
        let facts: Vec<_> = (0..50).map(|_| fact(wf, "success", None, None)).collect();
        let values = compute_values(&facts, &HashMap::new());
        assert_eq!(values.productivity_score, 100.0);
    }

    #[test]
    fn most_common_error_is_the_mode() {
        let wf = Uuid::new_v4();
        let facts = vec![
            fact(wf, "error", None, Some("timeout contacting crm")),
            fact(wf, "error", None, Some("timeout contacting crm")),
            fact(wf, "error", None, Some("invalid payload")),
        ];
        assert_eq!(
            most_common_error(&facts).as_deref(),
            Some("timeout contacting crm")
        );
    }

    #[test]
    fn most_common_error_absent_without_errors() {
        let wf = Uuid::new_v4();
        let facts = vec![fact(wf, "success", None, None)];
        assert_eq!(most_common_error(&facts), None);
    }
}
