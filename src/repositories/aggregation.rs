//! # Aggregation Repository
//!
//! Persistence for computed metric rollups and daily workflow trend
//! snapshots. Rollups are keyed by `(tenant, workflow|NULL, period_type,
//! period_start)` and always upserted, never duplicated.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::metrics_aggregation::{
    ActiveModel as AggregationActiveModel, Column as AggregationColumn, Entity as Aggregation,
    Model as AggregationModel,
};
use crate::models::workflow_trend::{
    ActiveModel as TrendActiveModel, Column as TrendColumn, Entity as WorkflowTrend,
    Model as WorkflowTrendModel,
};

/// Computed metric values for one period, ready to persist.
#[derive(Debug, Clone)]
pub struct AggregationValues {
    pub total_executions: i64,
    pub successful_executions: i64,
    pub failed_executions: i64,
    pub canceled_executions: i64,
    pub success_rate: f64,
    pub min_execution_time_ms: Option<i64>,
    pub avg_execution_time_ms: Option<f64>,
    pub max_execution_time_ms: Option<i64>,
    pub total_data_size_bytes: Option<i64>,
    pub avg_data_size_bytes: Option<f64>,
    pub most_common_error: Option<String>,
    pub time_saved_hours: f64,
    pub productivity_score: f64,
    pub total_workflows: Option<i64>,
    pub active_workflows: Option<i64>,
}

/// Repository for aggregation and trend snapshot rows.
pub struct AggregationRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> AggregationRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find the aggregation row for an exact period key.
    pub async fn find_by_period_key(
        &self,
        tenant_id: Uuid,
        workflow_id: Option<Uuid>,
        period_type: &str,
        period_start: DateTime<Utc>,
    ) -> Result<Option<AggregationModel>, RepositoryError> {
        let mut query = Aggregation::find()
            .filter(AggregationColumn::TenantId.eq(tenant_id))
            .filter(AggregationColumn::PeriodType.eq(period_type))
            .filter(AggregationColumn::PeriodStart.eq(period_start));

        query = match workflow_id {
            Some(workflow_id) => query.filter(AggregationColumn::WorkflowId.eq(workflow_id)),
            None => query.filter(AggregationColumn::WorkflowId.is_null()),
        };

        Ok(query.one(self.db).await?)
    }

    /// Upsert the aggregation row for a period key with freshly computed
    /// values.
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        workflow_id: Option<Uuid>,
        period_type: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        values: AggregationValues,
    ) -> Result<AggregationModel, RepositoryError> {
        let now = Utc::now();
        let existing = self
            .find_by_period_key(tenant_id, workflow_id, period_type, period_start)
            .await?;

        match existing {
            Some(aggregation) => {
                let mut active = aggregation.into_active_model();
                Self::apply_values(&mut active, &values);
                active.period_end = Set(period_end.into());
                active.computed_at = Set(now.into());
                Ok(active.update(self.db).await?)
            }
            None => {
                let mut active = AggregationActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(tenant_id),
                    workflow_id: Set(workflow_id),
                    period_type: Set(period_type.to_string()),
                    period_start: Set(period_start.into()),
                    period_end: Set(period_end.into()),
                    computed_at: Set(now.into()),
                    created_at: Set(now.into()),
                    ..Default::default()
                };
                Self::apply_values(&mut active, &values);
                Ok(active.insert(self.db).await?)
            }
        }
    }

    /// Refresh only `computed_at` on an existing row, leaving its metric
    /// fields untouched. Distinguishes "no new activity" from "never
    /// computed".
    pub async fn touch_computed_at(
        &self,
        aggregation: AggregationModel,
    ) -> Result<AggregationModel, RepositoryError> {
        let mut active = aggregation.into_active_model();
        active.computed_at = Set(Utc::now().into());
        Ok(active.update(self.db).await?)
    }

    /// The most recent `limit` aggregations of one type, newest first,
    /// optionally bounded to periods starting in `[since, until)`.
    pub async fn list_recent(
        &self,
        tenant_id: Uuid,
        workflow_id: Option<Uuid>,
        period_type: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<AggregationModel>, RepositoryError> {
        let mut query = Aggregation::find()
            .filter(AggregationColumn::TenantId.eq(tenant_id))
            .filter(AggregationColumn::PeriodType.eq(period_type));

        query = match workflow_id {
            Some(workflow_id) => query.filter(AggregationColumn::WorkflowId.eq(workflow_id)),
            None => query.filter(AggregationColumn::WorkflowId.is_null()),
        };

        if let Some(since) = since {
            query = query.filter(AggregationColumn::PeriodStart.gte(since));
        }
        if let Some(until) = until {
            query = query.filter(AggregationColumn::PeriodStart.lt(until));
        }

        let rows = query
            .order_by_desc(AggregationColumn::PeriodStart)
            .limit(limit)
            .all(self.db)
            .await?;
        Ok(rows)
    }

    /// Upsert the daily trend snapshot for one workflow and date.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_workflow_trend(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        date: NaiveDate,
        execution_count: i64,
        success_count: i64,
        failure_count: i64,
        avg_execution_time_ms: Option<f64>,
        time_saved_hours: f64,
    ) -> Result<WorkflowTrendModel, RepositoryError> {
        let now = Utc::now();
        let existing = WorkflowTrend::find()
            .filter(TrendColumn::WorkflowId.eq(workflow_id))
            .filter(TrendColumn::Date.eq(date))
            .one(self.db)
            .await?;

        match existing {
            Some(trend) => {
                let mut active = trend.into_active_model();
                active.execution_count = Set(execution_count);
                active.success_count = Set(success_count);
                active.failure_count = Set(failure_count);
                active.avg_execution_time_ms = Set(avg_execution_time_ms);
                active.time_saved_hours = Set(time_saved_hours);
                active.computed_at = Set(now.into());
                Ok(active.update(self.db).await?)
            }
            None => {
                let trend = TrendActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(tenant_id),
                    workflow_id: Set(workflow_id),
                    date: Set(date),
                    execution_count: Set(execution_count),
                    success_count: Set(success_count),
                    failure_count: Set(failure_count),
                    avg_execution_time_ms: Set(avg_execution_time_ms),
                    time_saved_hours: Set(time_saved_hours),
                    computed_at: Set(now.into()),
                };
                Ok(trend.insert(self.db).await?)
            }
        }
    }

    /// Daily trend snapshots for a workflow, oldest first.
    pub async fn list_workflow_trends(
        &self,
        workflow_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<WorkflowTrendModel>, RepositoryError> {
        let trends = WorkflowTrend::find()
            .filter(TrendColumn::WorkflowId.eq(workflow_id))
            .filter(TrendColumn::Date.gte(since))
            .order_by_asc(TrendColumn::Date)
            .all(self.db)
            .await?;
        Ok(trends)
    }

    fn apply_values(active: &mut AggregationActiveModel, values: &AggregationValues) {
        active.total_executions = Set(values.total_executions);
        active.successful_executions = Set(values.successful_executions);
        active.failed_executions = Set(values.failed_executions);
        active.canceled_executions = Set(values.canceled_executions);
        active.success_rate = Set(values.success_rate);
        active.min_execution_time_ms = Set(values.min_execution_time_ms);
        active.avg_execution_time_ms = Set(values.avg_execution_time_ms);
        active.max_execution_time_ms = Set(values.max_execution_time_ms);
        active.total_data_size_bytes = Set(values.total_data_size_bytes);
        active.avg_data_size_bytes = Set(values.avg_data_size_bytes);
        active.most_common_error = Set(values.most_common_error.clone());
        active.time_saved_hours = Set(values.time_saved_hours);
        active.productivity_score = Set(values.productivity_score);
        active.total_workflows = Set(values.total_workflows);
        active.active_workflows = Set(values.active_workflows);
    }
}
