//! WorkflowTrendMetrics entity model
//!
//! Daily per-workflow snapshot for trend-line rendering. Derived data:
//! always recomputable from execution facts, upserted by `(workflow_id,
//! date)`.

use super::workflow::Entity as Workflow;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_trend_metrics")]
pub struct Model {
    /// Unique identifier for the snapshot (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier for multi-tenancy
    pub tenant_id: Uuid,

    /// Workflow this snapshot covers
    pub workflow_id: Uuid,

    /// Day the snapshot covers (UTC)
    pub date: Date,

    /// Production executions started on this day
    pub execution_count: i64,

    /// Successful executions on this day
    pub success_count: i64,

    /// Failed executions on this day
    pub failure_count: i64,

    /// Average execution duration on this day
    pub avg_execution_time_ms: Option<f64>,

    /// Hours saved by successful executions on this day
    pub time_saved_hours: f64,

    /// Timestamp of the last (re)computation of this row
    pub computed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Workflow",
        from = "Column::WorkflowId",
        to = "super::workflow::Column::Id"
    )]
    Workflow,
}

impl Related<Workflow> for Entity {
    fn to() -> RelationDef {
        Relation::Workflow.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
