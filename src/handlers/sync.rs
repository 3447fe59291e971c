//! # Sync and Aggregation Handlers
//!
//! Manual triggers for work the scheduler otherwise runs on its own cadence.

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::aggregate::{AggregationReport, PeriodType};
use crate::auth::OperatorAuth;
use crate::error::{ApiError, SyncError};
use crate::server::AppState;
use crate::sync::SyncReport;
use crate::tasks;

/// Request payload for a manual aggregation run
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RunAggregationsDto {
    /// Reference date for the rollup periods. Defaults to today (UTC).
    #[schema(example = "2026-01-15")]
    pub date: Option<NaiveDate>,
    /// Run only this granularity; all three when absent.
    pub period: Option<PeriodType>,
}

/// Trigger an immediate sync for one tenant
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/sync",
    security(("bearer_auth" = [])),
    params(("tenant_id" = Uuid, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Sync completed", body = SyncReport),
        (status = 404, description = "Tenant not found", body = ApiError),
        (status = 409, description = "A sync for this tenant is already running", body = ApiError),
        (status = 502, description = "Remote n8n API failure", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<SyncReport>, ApiError> {
    let report = tasks::sync_tenant(
        &state.db,
        &state.config.sync,
        state.crypto_key.as_deref(),
        &state.cache,
        tenant_id,
    )
    .await?;

    // The scheduler treats a lost lock race as routine; a caller asking for
    // a sync right now gets told to come back.
    if report.skipped_locked {
        return Err(SyncError::Locked(tenant_id).into());
    }

    Ok(Json(report))
}

/// Run rollups for all tenants, either one granularity or all three
#[utoipa::path(
    post,
    path = "/api/v1/aggregations/run",
    security(("bearer_auth" = [])),
    request_body = RunAggregationsDto,
    responses(
        (status = 200, description = "Aggregation run completed", body = AggregationReport),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn run_aggregations(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    body: Option<Json<RunAggregationsDto>>,
) -> Result<Json<AggregationReport>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

    let report =
        tasks::compute_aggregations(&state.db, &state.cache, date, request.period).await?;
    Ok(Json(report))
}
