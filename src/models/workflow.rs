//! Workflow entity model
//!
//! This module contains the SeaORM entity model for the workflows table,
//! a local mirror of remote n8n workflow definitions. The natural key for
//! sync upserts is `(tenant_id, remote_workflow_id)`.

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Workflow entity mirroring a remote automation definition
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflows")]
pub struct Model {
    /// Unique identifier for the workflow (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier for multi-tenancy
    pub tenant_id: Uuid,

    /// Remote n8n workflow id (unique per tenant)
    pub remote_workflow_id: String,

    /// Workflow display name
    pub name: String,

    /// Whether the workflow is active on the remote instance
    pub active: bool,

    /// Whether the workflow is archived on the remote instance
    pub archived: bool,

    /// Number of nodes in the workflow graph
    pub node_count: i32,

    /// Number of connections in the workflow graph
    pub connection_count: i32,

    /// Editable business parameter: minutes saved per successful execution
    pub time_saved_per_execution_minutes: i32,

    /// Creation timestamp reported by the remote instance
    pub remote_created_at: Option<DateTimeWithTimeZone>,

    /// Update timestamp reported by the remote instance
    pub remote_updated_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the local row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the local row was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Tenant",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
    #[sea_orm(has_many = "super::execution::Entity")]
    Execution,
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Execution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
