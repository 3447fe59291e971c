//! Per-tenant sync checkpoint tracking.
//!
//! One `sync_states` row per tenant records the last successful execution
//! sync, the observed execution date range, cumulative counts, error history,
//! and the sync lock. The checkpoint drives the incremental fetch window.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::RepositoryError;
use crate::models::sync_state::{
    ActiveModel as SyncStateActiveModel, Column as SyncStateColumn, Entity as SyncState,
    Model as SyncStateModel,
};

/// Repository for sync checkpoint rows.
pub struct SyncStateRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SyncStateRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Fetch the tenant's checkpoint, creating an empty one on first use.
    pub async fn get_or_create(&self, tenant_id: Uuid) -> Result<SyncStateModel, RepositoryError> {
        if let Some(existing) = self.get(tenant_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let state = SyncStateActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            workflows_synced: Set(0),
            executions_synced: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let created = state.insert(self.db).await?;
        debug!(%tenant_id, "created sync state");
        Ok(created)
    }

    /// Fetch the tenant's checkpoint, if any.
    pub async fn get(&self, tenant_id: Uuid) -> Result<Option<SyncStateModel>, RepositoryError> {
        let state = SyncState::find()
            .filter(SyncStateColumn::TenantId.eq(tenant_id))
            .one(self.db)
            .await?;
        Ok(state)
    }

    /// The start of the incremental fetch window.
    ///
    /// A previously synced tenant re-fetches from `last_execution_sync` minus
    /// a fixed overlap, so clock skew and late updates to already-seen
    /// executions are absorbed. A never-synced tenant gets a bounded initial
    /// lookback instead of the full history.
    pub fn incremental_since(state: &SyncStateModel, config: &SyncConfig) -> DateTime<Utc> {
        match state.last_execution_sync {
            Some(last_sync) => {
                last_sync.with_timezone(&Utc) - Duration::seconds(config.overlap_seconds)
            }
            None => Utc::now() - Duration::days(config.initial_lookback_days),
        }
    }

    /// Record the outcome of an execution sync.
    ///
    /// `last_execution_sync` always advances to now, even when no new rows
    /// were found, so a stale tenant is distinguishable from a freshly polled
    /// but quiet one. The observed date range only ever widens.
    pub async fn record_execution_sync(
        &self,
        tenant_id: Uuid,
        count: u64,
        newest: Option<DateTime<Utc>>,
        oldest: Option<DateTime<Utc>>,
        last_execution_id: Option<String>,
    ) -> Result<SyncStateModel, RepositoryError> {
        let state = self.get_or_create(tenant_id).await?;
        let now = Utc::now();

        let current_newest = state.newest_execution_date.map(|d| d.with_timezone(&Utc));
        let current_oldest = state.oldest_execution_date.map(|d| d.with_timezone(&Utc));
        let executions_synced = state.executions_synced + count as i64;

        let mut active = state.into_active_model();
        active.last_execution_sync = Set(Some(now.into()));
        active.executions_synced = Set(executions_synced);
        active.updated_at = Set(now.into());

        if let Some(id) = last_execution_id {
            active.last_execution_id = Set(Some(id));
        }
        if let Some(newest) = newest
            && current_newest.is_none_or(|current| newest > current)
        {
            active.newest_execution_date = Set(Some(newest.into()));
        }
        if let Some(oldest) = oldest
            && current_oldest.is_none_or(|current| oldest < current)
        {
            active.oldest_execution_date = Set(Some(oldest.into()));
        }

        // A successful sync clears the error state.
        active.last_error = Set(None);
        active.last_error_at = Set(None);

        Ok(active.update(self.db).await?)
    }

    /// Record the outcome of a workflow sync.
    pub async fn record_workflow_sync(
        &self,
        tenant_id: Uuid,
        count: u64,
    ) -> Result<SyncStateModel, RepositoryError> {
        let state = self.get_or_create(tenant_id).await?;
        let now = Utc::now();
        let workflows_synced = state.workflows_synced + count as i64;

        let mut active = state.into_active_model();
        active.workflows_synced = Set(workflows_synced);
        active.updated_at = Set(now.into());

        Ok(active.update(self.db).await?)
    }

    /// Record a sync failure without touching the checkpoint window.
    pub async fn record_error(
        &self,
        tenant_id: Uuid,
        message: &str,
    ) -> Result<SyncStateModel, RepositoryError> {
        let state = self.get_or_create(tenant_id).await?;
        let now = Utc::now();

        let truncated: String = message.chars().take(1000).collect();
        let mut active = state.into_active_model();
        active.last_error = Set(Some(truncated));
        active.last_error_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());

        Ok(active.update(self.db).await?)
    }

    /// Try to take the tenant's exclusive sync lock.
    ///
    /// The lock is a `locked_until` timestamp claimed with a conditional
    /// update, so two contenders racing on the same row cannot both win. An
    /// expired lock is treated as free, which unblocks tenants whose worker
    /// died mid-sync.
    pub async fn try_acquire_lock(
        &self,
        tenant_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<bool, RepositoryError> {
        // Ensure the row exists before the conditional claim.
        self.get_or_create(tenant_id).await?;

        let now = Utc::now();
        let until = now + Duration::seconds(ttl_seconds);

        let result = SyncState::update_many()
            .col_expr(
                SyncStateColumn::LockedUntil,
                sea_orm::sea_query::Expr::value(until),
            )
            .filter(SyncStateColumn::TenantId.eq(tenant_id))
            .filter(
                SyncStateColumn::LockedUntil
                    .is_null()
                    .or(SyncStateColumn::LockedUntil.lt(now)),
            )
            .exec(self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Release the tenant's sync lock.
    pub async fn release_lock(&self, tenant_id: Uuid) -> Result<(), RepositoryError> {
        SyncState::update_many()
            .col_expr(
                SyncStateColumn::LockedUntil,
                sea_orm::sea_query::Expr::value(
                    sea_orm::Value::ChronoDateTimeWithTimeZone(None),
                ),
            )
            .filter(SyncStateColumn::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_window_uses_overlap_after_first_sync() {
        let config = SyncConfig::default();
        let last_sync = Utc::now() - Duration::hours(6);
        let state = SyncStateModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            last_execution_sync: Some(last_sync.into()),
            last_execution_id: None,
            oldest_execution_date: None,
            newest_execution_date: None,
            workflows_synced: 0,
            executions_synced: 0,
            last_error: None,
            last_error_at: None,
            locked_until: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let since = SyncStateRepository::incremental_since(&state, &config);
        assert_eq!(since, last_sync - Duration::seconds(3_600));
    }

    #[test]
    fn first_sync_uses_bounded_lookback() {
        let config = SyncConfig::default();
        let state = SyncStateModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            last_execution_sync: None,
            last_execution_id: None,
            oldest_execution_date: None,
            newest_execution_date: None,
            workflows_synced: 0,
            executions_synced: 0,
            last_error: None,
            last_error_at: None,
            locked_until: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let since = SyncStateRepository::incremental_since(&state, &config);
        let expected = Utc::now() - Duration::days(30);
        assert!((since - expected).num_seconds().abs() < 5);
    }
}
