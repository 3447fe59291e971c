//! # Workflow Repository
//!
//! Upserts and queries for locally mirrored workflows. The natural key is
//! `(tenant_id, remote_workflow_id)`; re-running a sync never creates
//! duplicate rows.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::workflow::{
    ActiveModel as WorkflowActiveModel, Column as WorkflowColumn, Entity as Workflow,
    Model as WorkflowModel,
};
use crate::remote::types::RemoteWorkflow;

/// Default configured time saving per successful execution, in minutes.
pub const DEFAULT_TIME_SAVED_PER_EXECUTION_MINUTES: i32 = 30;

/// Repository for Workflow database operations
pub struct WorkflowRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> WorkflowRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Upsert a remote workflow by its natural key. Mutable fields are
    /// refreshed on existing rows; configured fields (per-execution time
    /// saving) are left alone.
    pub async fn upsert_remote(
        &self,
        tenant_id: Uuid,
        remote: &RemoteWorkflow,
    ) -> Result<WorkflowModel, RepositoryError> {
        let now = Utc::now();
        let existing = self.find_by_remote_id(tenant_id, &remote.id).await?;

        match existing {
            Some(workflow) => {
                let mut active = workflow.into_active_model();
                active.name = Set(remote.name.clone());
                active.active = Set(remote.active);
                active.archived = Set(remote.is_archived);
                active.node_count = Set(remote.node_count());
                active.connection_count = Set(remote.connection_count());
                active.remote_created_at = Set(remote.created_at.map(Into::into));
                active.remote_updated_at = Set(remote.updated_at.map(Into::into));
                active.updated_at = Set(now.into());
                Ok(active.update(self.db).await?)
            }
            None => {
                let workflow = WorkflowActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(tenant_id),
                    remote_workflow_id: Set(remote.id.clone()),
                    name: Set(remote.name.clone()),
                    active: Set(remote.active),
                    archived: Set(remote.is_archived),
                    node_count: Set(remote.node_count()),
                    connection_count: Set(remote.connection_count()),
                    time_saved_per_execution_minutes: Set(
                        DEFAULT_TIME_SAVED_PER_EXECUTION_MINUTES,
                    ),
                    remote_created_at: Set(remote.created_at.map(Into::into)),
                    remote_updated_at: Set(remote.updated_at.map(Into::into)),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                Ok(workflow.insert(self.db).await?)
            }
        }
    }

    /// Find a workflow by its remote ID within one tenant.
    pub async fn find_by_remote_id(
        &self,
        tenant_id: Uuid,
        remote_workflow_id: &str,
    ) -> Result<Option<WorkflowModel>, RepositoryError> {
        let workflow = Workflow::find()
            .filter(WorkflowColumn::TenantId.eq(tenant_id))
            .filter(WorkflowColumn::RemoteWorkflowId.eq(remote_workflow_id))
            .one(self.db)
            .await?;
        Ok(workflow)
    }

    /// All workflows belonging to a tenant.
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WorkflowModel>, RepositoryError> {
        let workflows = Workflow::find()
            .filter(WorkflowColumn::TenantId.eq(tenant_id))
            .all(self.db)
            .await?;
        Ok(workflows)
    }

    /// Active, non-archived workflows belonging to a tenant.
    pub async fn list_active_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WorkflowModel>, RepositoryError> {
        let workflows = Workflow::find()
            .filter(WorkflowColumn::TenantId.eq(tenant_id))
            .filter(WorkflowColumn::Active.eq(true))
            .filter(WorkflowColumn::Archived.eq(false))
            .all(self.db)
            .await?;
        Ok(workflows)
    }

    /// Total workflow count for a tenant.
    pub async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<u64, RepositoryError> {
        let count = Workflow::find()
            .filter(WorkflowColumn::TenantId.eq(tenant_id))
            .count(self.db)
            .await?;
        Ok(count)
    }

    /// Active workflow count for a tenant.
    pub async fn count_active_by_tenant(&self, tenant_id: Uuid) -> Result<u64, RepositoryError> {
        let count = Workflow::find()
            .filter(WorkflowColumn::TenantId.eq(tenant_id))
            .filter(WorkflowColumn::Active.eq(true))
            .filter(WorkflowColumn::Archived.eq(false))
            .count(self.db)
            .await?;
        Ok(count)
    }

    /// Update the configured per-execution time saving for a workflow.
    pub async fn set_time_saved_per_execution(
        &self,
        workflow_id: Uuid,
        minutes: i32,
    ) -> Result<WorkflowModel, RepositoryError> {
        if minutes < 0 {
            return Err(RepositoryError::Validation(
                "time saved per execution cannot be negative".to_string(),
            ));
        }

        let workflow = Workflow::find_by_id(workflow_id)
            .one(self.db)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("workflow {workflow_id} not found"))
            })?;

        let mut active = workflow.into_active_model();
        active.time_saved_per_execution_minutes = Set(minutes);
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }
}
