//! # Server Configuration
//!
//! This module contains the server setup and configuration for the
//! FlowMetrics API.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::query::MetricsCache;
use crate::telemetry::{self, TraceContext};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub cache: Arc<MetricsCache>,
    pub crypto_key: Option<Arc<CryptoKey>>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/v1/tenants",
            post(handlers::tenants::create_tenant).get(handlers::tenants::list_tenants),
        )
        .route(
            "/api/v1/tenants/{tenant_id}",
            get(handlers::tenants::get_tenant).delete(handlers::tenants::delete_tenant),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/api-key",
            put(handlers::tenants::update_api_key),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/sync",
            post(handlers::sync::trigger_sync),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/metrics",
            get(handlers::metrics::get_metrics_summary),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/metrics/history",
            get(handlers::metrics::get_metrics_history),
        )
        .route(
            "/api/v1/aggregations/run",
            post(handlers::sync::run_aggregations),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            crate::auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/openapi.json", get(openapi_spec))
        .merge(protected)
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assign every request a trace ID, visible to handlers via the request
/// extension and to error construction via task-local storage.
async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let context = TraceContext {
        trace_id: format!("req-{}", Uuid::new_v4().simple()),
    };
    request.extensions_mut().insert(context.clone());
    telemetry::with_trace_context(context, next.run(request)).await
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Starts the server with the given configuration
pub async fn run_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = state.config.profile.clone();

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::tenants::create_tenant,
        crate::handlers::tenants::list_tenants,
        crate::handlers::tenants::get_tenant,
        crate::handlers::tenants::update_api_key,
        crate::handlers::tenants::delete_tenant,
        crate::handlers::sync::trigger_sync,
        crate::handlers::sync::run_aggregations,
        crate::handlers::metrics::get_metrics_summary,
        crate::handlers::metrics::get_metrics_history,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::tenants::CreateTenantDto,
            crate::handlers::tenants::UpdateApiKeyDto,
            crate::handlers::tenants::TenantDto,
            crate::handlers::sync::RunAggregationsDto,
            crate::sync::SyncReport,
            crate::sync::CustomFilters,
            crate::aggregate::AggregationReport,
            crate::aggregate::PeriodType,
            crate::aggregate::MetricsTrend,
            crate::query::MetricsSummary,
            crate::query::MetricsHistoryPoint,
        )
    ),
    info(
        title = "FlowMetrics API",
        description = "Multi-tenant workflow analytics over the n8n REST API",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
