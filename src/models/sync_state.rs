//! SyncState entity model
//!
//! This module contains the SeaORM entity model for the sync_states table,
//! the per-tenant checkpoint that drives incremental sync decisions.
//! `newest_execution_date` and `oldest_execution_date` only ever extend
//! the observed range; `locked_until` carries the per-tenant sync lock.

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// SyncState entity: one checkpoint row per tenant
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_states")]
pub struct Model {
    /// Unique identifier for the sync state (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant this checkpoint belongs to (unique)
    pub tenant_id: Uuid,

    /// Timestamp of the last execution sync attempt that completed
    pub last_execution_sync: Option<DateTimeWithTimeZone>,

    /// Remote id of the last execution observed
    pub last_execution_id: Option<String>,

    /// Oldest execution start timestamp ever observed
    pub oldest_execution_date: Option<DateTimeWithTimeZone>,

    /// Newest execution start timestamp ever observed (monotonic)
    pub newest_execution_date: Option<DateTimeWithTimeZone>,

    /// Cumulative count of workflows synced
    pub workflows_synced: i64,

    /// Cumulative count of executions synced
    pub executions_synced: i64,

    /// Most recent sync error message
    pub last_error: Option<String>,

    /// Timestamp of the most recent sync error
    pub last_error_at: Option<DateTimeWithTimeZone>,

    /// Sync lock expiry; a non-null future value means a sync is in flight
    pub locked_until: Option<DateTimeWithTimeZone>,

    /// Timestamp when the row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the row was last updated
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
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
