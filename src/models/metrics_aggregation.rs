//! MetricsAggregation entity model
//!
//! This module contains the SeaORM entity model for the metrics_aggregations
//! table. Rows are derived rollups over a fixed time bucket and are uniquely
//! identified by `(tenant_id, workflow_id | NULL, period_type, period_start)`;
//! a NULL workflow_id means the row is tenant-wide.

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// MetricsAggregation entity: one rollup per period key
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "metrics_aggregations")]
pub struct Model {
    /// Unique identifier for the aggregation (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier for multi-tenancy
    pub tenant_id: Uuid,

    /// Workflow scope; NULL means tenant-wide
    pub workflow_id: Option<Uuid>,

    /// Period bucket type (daily/weekly/monthly)
    pub period_type: String,

    /// Inclusive start of the period
    pub period_start: DateTimeWithTimeZone,

    /// Inclusive end of the period
    pub period_end: DateTimeWithTimeZone,

    /// Total production executions in the period
    pub total_executions: i64,

    /// Executions that finished with status success
    pub successful_executions: i64,

    /// Executions that finished with status error or crashed
    pub failed_executions: i64,

    /// Executions that were canceled
    pub canceled_executions: i64,

    /// successful / total * 100
    pub success_rate: f64,

    /// Minimum execution duration over runs with a known duration
    pub min_execution_time_ms: Option<i64>,

    /// Average execution duration over runs with a known duration
    pub avg_execution_time_ms: Option<f64>,

    /// Maximum execution duration over runs with a known duration
    pub max_execution_time_ms: Option<i64>,

    /// Total result payload size over runs with a known size
    pub total_data_size_bytes: Option<i64>,

    /// Average result payload size over runs with a known size
    pub avg_data_size_bytes: Option<f64>,

    /// Mode of truncated error messages in the period
    pub most_common_error: Option<String>,

    /// Derived: hours saved by successful executions in the period
    pub time_saved_hours: f64,

    /// Derived: min(100, success_rate * total / 10)
    pub productivity_score: f64,

    /// Workflow count at compute time (tenant-wide rows only)
    pub total_workflows: Option<i64>,

    /// Active workflow count at compute time (tenant-wide rows only)
    pub active_workflows: Option<i64>,

    /// Timestamp of the last (re)computation of this row
    pub computed_at: DateTimeWithTimeZone,

    /// Timestamp when the row was first created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Tenant",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
