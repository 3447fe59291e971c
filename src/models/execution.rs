//! Execution entity model
//!
//! This module contains the SeaORM entity model for the executions table.
//! One row per remote workflow run, upserted by the globally unique
//! `remote_execution_id`, so a run first seen as `running` is updated in
//! place when it is later observed as finished.

use super::workflow::Entity as Workflow;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Execution entity representing one remote workflow run
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "executions")]
pub struct Model {
    /// Unique identifier for the execution (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier for multi-tenancy
    pub tenant_id: Uuid,

    /// Local workflow this execution belongs to
    pub workflow_id: Uuid,

    /// Remote n8n execution id (globally unique)
    pub remote_execution_id: String,

    /// Execution status (success/error/waiting/running/canceled/crashed/new)
    pub status: String,

    /// Trigger mode (manual/trigger/retry/webhook/error_trigger/integrated)
    pub mode: String,

    /// Whether the remote instance reported the run as finished
    pub finished: bool,

    /// Timestamp when the run started
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the run stopped
    pub stopped_at: Option<DateTimeWithTimeZone>,

    /// Computed duration (stopped_at - started_at when both are known)
    pub execution_time_ms: Option<i64>,

    /// Persisted verdict of the production-execution filter
    pub is_production: bool,

    /// Error message for failed runs
    pub error_message: Option<String>,

    /// Size of the execution result payload, if reported
    pub data_size_bytes: Option<i64>,

    /// Timestamp when the local row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the local row was last updated
    pub updated_at: DateTimeWithTimeZone,
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
