//! # Metrics Query Handlers
//!
//! Read side of the service: current summaries from raw execution facts and
//! historical trends from precomputed rollups.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::aggregate::PeriodType;
use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::query::{HistoryQuery, MetricsHistoryPoint, MetricsQueryService, MetricsSummary};
use crate::server::AppState;

/// Query parameters for the metrics history endpoint
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct HistoryParams {
    /// Rollup granularity
    #[serde(default = "default_period")]
    pub period: PeriodType,
    /// Restrict the history to one workflow; tenant-wide when absent
    pub workflow_id: Option<Uuid>,
    /// Earliest period start to include (inclusive)
    pub start: Option<NaiveDate>,
    /// Latest period start to include (inclusive)
    pub end: Option<NaiveDate>,
    /// Number of data points, newest first (clamped to 1..=90)
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_period() -> PeriodType {
    PeriodType::Daily
}

fn default_limit() -> u64 {
    30
}

/// Current metrics summary for a tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/metrics",
    security(("bearer_auth" = [])),
    params(("tenant_id" = Uuid, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Metrics summary", body = MetricsSummary),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "metrics"
)]
pub async fn get_metrics_summary(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<MetricsSummary>, ApiError> {
    let service = MetricsQueryService::new(&state.db, &state.cache);
    let summary = service.summary(tenant_id).await?;
    Ok(Json(summary))
}

/// Historical metrics for a tenant at a chosen granularity
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/metrics/history",
    security(("bearer_auth" = [])),
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant identifier"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "Historical data points, newest first", body = [MetricsHistoryPoint]),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "metrics"
)]
pub async fn get_metrics_history(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MetricsHistoryPoint>>, ApiError> {
    let service = MetricsQueryService::new(&state.db, &state.cache);
    let points = service
        .history(
            tenant_id,
            HistoryQuery {
                period_type: params.period,
                workflow_id: params.workflow_id,
                start: params.start,
                end: params.end,
                limit: params.limit,
            },
        )
        .await?;
    Ok(Json(points))
}
