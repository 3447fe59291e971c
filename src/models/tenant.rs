//! Tenant entity model
//!
//! This module contains the SeaORM entity model for the tenants table.
//! A tenant owns one n8n instance: a base URL plus an encrypted API key.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Tenant entity representing multi-tenant isolation
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name for the tenant
    pub name: String,

    /// Base URL of the tenant's n8n instance
    pub base_url: String,

    /// AES-256-GCM encrypted n8n API key
    pub api_key_ciphertext: Option<Vec<u8>>,

    /// Tenant-specific production-filter overrides, as JSON
    pub custom_filters: Option<Json>,

    /// Timestamp when the tenant was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the tenant was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::workflow::Entity")]
    Workflow,
    #[sea_orm(has_many = "super::sync_state::Entity")]
    SyncState,
}

impl Related<super::workflow::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workflow.def()
    }
}

impl Related<super::sync_state::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncState.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
