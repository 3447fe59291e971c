//! # Execution Repository
//!
//! Upserts and queries for locally mirrored executions. The natural key is
//! the globally unique `remote_execution_id`; status transitions observed on
//! later syncs update the existing row in place.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::execution::{
    ActiveModel as ExecutionActiveModel, Column as ExecutionColumn, Entity as Execution,
    Model as ExecutionModel,
};
use crate::remote::types::RemoteExecution;

/// Longest error message persisted locally.
const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Fields written on every upsert of an observed execution.
#[derive(Debug, Clone)]
pub struct ExecutionUpsert<'r> {
    pub remote: &'r RemoteExecution,
    pub workflow_id: Uuid,
    pub is_production: bool,
    pub error_message: Option<String>,
    pub data_size_bytes: Option<i64>,
}

/// All-time execution totals for a tenant, computed from raw facts.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTotals {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Repository for Execution database operations
pub struct ExecutionRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ExecutionRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Upsert an observed execution by its remote ID.
    ///
    /// Existing rows only have their mutable fields refreshed, which handles
    /// a `running` execution later observed as `success` or `error`.
    pub async fn upsert_observed(
        &self,
        tenant_id: Uuid,
        upsert: ExecutionUpsert<'_>,
    ) -> Result<ExecutionModel, RepositoryError> {
        let now = Utc::now();
        let remote = upsert.remote;
        let status = remote.effective_status().as_str().to_string();
        let error_message = upsert
            .error_message
            .map(|msg| msg.chars().take(MAX_ERROR_MESSAGE_LEN).collect::<String>());

        let existing = Execution::find()
            .filter(ExecutionColumn::RemoteExecutionId.eq(remote.id.as_str()))
            .one(self.db)
            .await?;

        match existing {
            Some(execution) => {
                let mut active = execution.into_active_model();
                active.status = Set(status);
                active.finished = Set(remote.finished);
                active.started_at = Set(remote.started_at.map(Into::into));
                active.stopped_at = Set(remote.stopped_at.map(Into::into));
                active.execution_time_ms = Set(remote.duration_ms());
                // A later observation without a payload must not erase an
                // error message already on record.
                if let Some(message) = error_message {
                    active.error_message = Set(Some(message));
                }
                if let Some(size) = upsert.data_size_bytes {
                    active.data_size_bytes = Set(Some(size));
                }
                active.updated_at = Set(now.into());
                Ok(active.update(self.db).await?)
            }
            None => {
                let execution = ExecutionActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(tenant_id),
                    workflow_id: Set(upsert.workflow_id),
                    remote_execution_id: Set(remote.id.clone()),
                    status: Set(status),
                    mode: Set(remote.mode_str().to_string()),
                    finished: Set(remote.finished),
                    started_at: Set(remote.started_at.map(Into::into)),
                    stopped_at: Set(remote.stopped_at.map(Into::into)),
                    execution_time_ms: Set(remote.duration_ms()),
                    is_production: Set(upsert.is_production),
                    error_message: Set(error_message),
                    data_size_bytes: Set(upsert.data_size_bytes),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                Ok(execution.insert(self.db).await?)
            }
        }
    }

    /// Production executions whose `started_at` falls inside the period,
    /// optionally scoped to one workflow. Ordered by start time.
    pub async fn list_production_in_period(
        &self,
        tenant_id: Uuid,
        workflow_id: Option<Uuid>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<ExecutionModel>, RepositoryError> {
        let mut query = Execution::find()
            .filter(ExecutionColumn::TenantId.eq(tenant_id))
            .filter(ExecutionColumn::IsProduction.eq(true))
            .filter(ExecutionColumn::StartedAt.gte(period_start))
            .filter(ExecutionColumn::StartedAt.lte(period_end));

        if let Some(workflow_id) = workflow_id {
            query = query.filter(ExecutionColumn::WorkflowId.eq(workflow_id));
        }

        let executions = query
            .order_by_asc(ExecutionColumn::StartedAt)
            .all(self.db)
            .await?;
        Ok(executions)
    }

    /// All-time production totals for a tenant, straight from raw facts.
    pub async fn production_totals(
        &self,
        tenant_id: Uuid,
    ) -> Result<ExecutionTotals, RepositoryError> {
        let base = Execution::find()
            .filter(ExecutionColumn::TenantId.eq(tenant_id))
            .filter(ExecutionColumn::IsProduction.eq(true));

        let total = base.clone().count(self.db).await?;
        let successful = base
            .clone()
            .filter(ExecutionColumn::Status.eq("success"))
            .count(self.db)
            .await?;
        let failed = base
            .filter(ExecutionColumn::Status.is_in(["error", "crashed"]))
            .count(self.db)
            .await?;

        Ok(ExecutionTotals {
            total,
            successful,
            failed,
        })
    }
}
