//! Incremental metrics sync engine.
//!
//! Pulls workflows and executions from a tenant's n8n instance, classifies
//! executions, and reconciles them into the local store with natural-key
//! upserts. Re-running a sync is always safe.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::crypto::CryptoKey;
use crate::error::SyncError;
use crate::models::tenant::Model as TenantModel;
use crate::remote::{N8nClient, types::RemoteWorkflow};
use crate::repositories::{
    ExecutionRepository, TenantRepository, WorkflowRepository, execution::ExecutionUpsert,
};
use crate::sync::filter::ProductionExecutionFilter;
use crate::sync::state::SyncStateRepository;

/// Outcome of one tenant sync run.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SyncReport {
    pub tenant_id: Uuid,
    /// Workflows upserted this run.
    pub workflows_synced: u64,
    /// Production executions upserted this run.
    pub executions_synced: u64,
    /// Fetched executions the classifier rejected.
    pub executions_filtered: u64,
    /// Executions referencing a workflow unknown locally.
    pub executions_skipped: u64,
    /// True when another sync held the tenant lock and this run did nothing.
    pub skipped_locked: bool,
    /// Non-fatal problems encountered during the run.
    pub errors: Vec<String>,
}

/// Orchestrates the pull-classify-upsert cycle for one tenant at a time.
pub struct MetricsSyncEngine<'a> {
    db: &'a DatabaseConnection,
    config: &'a SyncConfig,
    crypto_key: Option<&'a CryptoKey>,
    filter: ProductionExecutionFilter,
}

impl<'a> MetricsSyncEngine<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        config: &'a SyncConfig,
        crypto_key: Option<&'a CryptoKey>,
    ) -> Self {
        Self {
            db,
            config,
            crypto_key,
            filter: ProductionExecutionFilter::new(),
        }
    }

    /// Sync one tenant end to end.
    ///
    /// Workflow sync failures abort the run (executions need workflow rows to
    /// link against); execution sync failures are recorded on the checkpoint
    /// and surface in the report without rolling back committed workflow
    /// updates. A concurrent sync of the same tenant turns this call into a
    /// no-op report rather than a queued retry.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn sync_tenant(&self, tenant_id: Uuid) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let tenants = TenantRepository::new(self.db);
        let states = SyncStateRepository::new(self.db);

        let tenant = tenants
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or(SyncError::TenantNotFound(tenant_id))?;

        let client = self.client_for(&tenant)?;

        if !states
            .try_acquire_lock(tenant_id, self.config.lock_ttl_seconds)
            .await?
        {
            info!(%tenant_id, "sync already in progress, skipping");
            counter!("sync_skipped_locked_total").increment(1);
            return Ok(SyncReport {
                tenant_id,
                skipped_locked: true,
                ..Default::default()
            });
        }

        let result = self.sync_locked(&tenant, &client).await;
        states.release_lock(tenant_id).await?;

        match result {
            Ok(report) => {
                histogram!("sync_duration_seconds").record(started.elapsed().as_secs_f64());
                counter!("sync_runs_total", "outcome" => "ok").increment(1);
                info!(
                    %tenant_id,
                    workflows = report.workflows_synced,
                    executions = report.executions_synced,
                    filtered = report.executions_filtered,
                    "sync completed"
                );
                Ok(report)
            }
            Err(err) => {
                counter!("sync_runs_total", "outcome" => "error").increment(1);
                states.record_error(tenant_id, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn sync_locked(
        &self,
        tenant: &TenantModel,
        client: &N8nClient,
    ) -> Result<SyncReport, SyncError> {
        let states = SyncStateRepository::new(self.db);
        let mut report = SyncReport {
            tenant_id: tenant.id,
            ..Default::default()
        };

        // Workflows first: executions depend on their rows existing.
        let remote_workflows = self.sync_workflows(tenant, client, &mut report).await?;

        // Execution failures past this point are recorded, not fatal.
        let state = states.get_or_create(tenant.id).await?;
        let since = SyncStateRepository::incremental_since(&state, self.config);

        if let Err(err) = self
            .sync_executions(tenant, client, &remote_workflows, since, &mut report)
            .await
        {
            warn!(tenant_id = %tenant.id, error = %err, "execution sync failed");
            states.record_error(tenant.id, &err.to_string()).await?;
            report.errors.push(err.to_string());
        }

        Ok(report)
    }

    async fn sync_workflows(
        &self,
        tenant: &TenantModel,
        client: &N8nClient,
        report: &mut SyncReport,
    ) -> Result<HashMap<String, RemoteWorkflow>, SyncError> {
        let workflows = WorkflowRepository::new(self.db);
        let states = SyncStateRepository::new(self.db);

        let remote_workflows = client.fetch_workflows().await?;

        for remote in &remote_workflows {
            workflows.upsert_remote(tenant.id, remote).await?;
            report.workflows_synced += 1;
        }

        states
            .record_workflow_sync(tenant.id, report.workflows_synced)
            .await?;
        counter!("sync_workflows_total").increment(report.workflows_synced);

        Ok(remote_workflows
            .into_iter()
            .map(|wf| (wf.id.clone(), wf))
            .collect())
    }

    async fn sync_executions(
        &self,
        tenant: &TenantModel,
        client: &N8nClient,
        remote_workflows: &HashMap<String, RemoteWorkflow>,
        since: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let workflows = WorkflowRepository::new(self.db);
        let executions = ExecutionRepository::new(self.db);
        let states = SyncStateRepository::new(self.db);

        let custom_filters = TenantRepository::resolve_custom_filters(tenant);
        let remote_executions = client.fetch_executions(Some(since)).await?;
        debug!(
            tenant_id = %tenant.id,
            fetched = remote_executions.len(),
            since = %since,
            "fetched execution window"
        );

        let mut newest: Option<DateTime<Utc>> = None;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut last_execution_id: Option<String> = None;

        for remote in &remote_executions {
            let workflow_context = remote_workflows.get(&remote.workflow_id);
            let is_production = self.filter.is_production(
                remote,
                workflow_context,
                custom_filters.as_ref(),
                remote.error_summary(),
            );

            if !is_production {
                report.executions_filtered += 1;
                continue;
            }

            // A workflow deleted upstream between fetches leaves orphaned
            // executions; skip them rather than failing the batch.
            let Some(workflow) = workflows
                .find_by_remote_id(tenant.id, &remote.workflow_id)
                .await?
            else {
                warn!(
                    tenant_id = %tenant.id,
                    remote_execution_id = %remote.id,
                    remote_workflow_id = %remote.workflow_id,
                    "execution references unknown workflow, skipping"
                );
                report.executions_skipped += 1;
                continue;
            };

            executions
                .upsert_observed(
                    tenant.id,
                    ExecutionUpsert {
                        remote,
                        workflow_id: workflow.id,
                        is_production: true,
                        error_message: remote.error_summary().map(str::to_string),
                        data_size_bytes: remote.data_size_bytes(),
                    },
                )
                .await?;
            report.executions_synced += 1;

            if let Some(started_at) = remote.started_at {
                if newest.is_none_or(|n| started_at > n) {
                    newest = Some(started_at);
                    last_execution_id = Some(remote.id.clone());
                }
                if oldest.is_none_or(|o| started_at < o) {
                    oldest = Some(started_at);
                }
            }
        }

        states
            .record_execution_sync(
                tenant.id,
                report.executions_synced,
                newest,
                oldest,
                last_execution_id,
            )
            .await?;
        counter!("sync_executions_total").increment(report.executions_synced);

        Ok(())
    }

    /// Build the remote client for a tenant, failing fast with a
    /// configuration error when no usable credential exists.
    fn client_for(&self, tenant: &TenantModel) -> Result<N8nClient, SyncError> {
        let api_key = TenantRepository::resolve_api_key(tenant, self.crypto_key)
            .map_err(|e| SyncError::Configuration(e.to_string()))?
            .ok_or_else(|| {
                SyncError::Configuration(format!("tenant {} has no API key", tenant.id))
            })?;

        N8nClient::new(&tenant.base_url, &api_key, self.config)
    }
}
