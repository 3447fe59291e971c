//! # Tenant API Handlers
//!
//! Tenant lifecycle: registration of n8n instances, credential rotation, and
//! removal.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::models::tenant::Model as TenantModel;
use crate::repositories::{TenantRepository, tenant::CreateTenantRequest};
use crate::server::AppState;
use crate::sync::CustomFilters;

/// Request payload for registering a tenant
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTenantDto {
    /// Display name for the tenant (required, max 255 characters)
    #[schema(example = "Acme Corp")]
    pub name: String,
    /// Base URL of the tenant's n8n instance
    #[schema(example = "https://n8n.acme.example")]
    pub base_url: String,
    /// n8n API key, stored encrypted
    pub api_key: Option<String>,
    /// Production-filter overrides
    pub custom_filters: Option<CustomFilters>,
}

/// Request payload for rotating a tenant's API key
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApiKeyDto {
    pub api_key: String,
}

/// Tenant representation returned by the API. The API key is never echoed.
#[derive(Debug, Serialize, ToSchema)]
pub struct TenantDto {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    /// Whether an API key is on file for this tenant
    pub has_api_key: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantModel> for TenantDto {
    fn from(tenant: TenantModel) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            base_url: tenant.base_url,
            has_api_key: tenant.api_key_ciphertext.is_some(),
            created_at: tenant.created_at.with_timezone(&Utc),
            updated_at: tenant.updated_at.with_timezone(&Utc),
        }
    }
}

/// Register a tenant
#[utoipa::path(
    post,
    path = "/api/v1/tenants",
    security(("bearer_auth" = [])),
    request_body = CreateTenantDto,
    responses(
        (status = 201, description = "Tenant created", body = TenantDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Json(request): Json<CreateTenantDto>,
) -> Result<(StatusCode, Json<TenantDto>), ApiError> {
    let tenants = TenantRepository::new(&state.db);
    let tenant = tenants
        .create_tenant(
            CreateTenantRequest {
                name: request.name,
                base_url: request.base_url,
                api_key: request.api_key,
                custom_filters: request.custom_filters,
            },
            state.crypto_key.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(tenant.into())))
}

/// List all tenants
#[utoipa::path(
    get,
    path = "/api/v1/tenants",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registered tenants", body = [TenantDto]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn list_tenants(
    State(state): State<AppState>,
    _auth: OperatorAuth,
) -> Result<Json<Vec<TenantDto>>, ApiError> {
    let tenants = TenantRepository::new(&state.db);
    let rows = tenants.list_tenants().await?;
    Ok(Json(rows.into_iter().map(TenantDto::from).collect()))
}

/// Fetch one tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}",
    security(("bearer_auth" = [])),
    params(("tenant_id" = Uuid, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Tenant", body = TenantDto),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_tenant(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantDto>, ApiError> {
    let tenants = TenantRepository::new(&state.db);
    let tenant = tenants
        .get_tenant_by_id(tenant_id)
        .await?
        .ok_or_else(|| crate::error::SyncError::TenantNotFound(tenant_id))?;
    Ok(Json(tenant.into()))
}

/// Rotate a tenant's API key
#[utoipa::path(
    put,
    path = "/api/v1/tenants/{tenant_id}/api-key",
    security(("bearer_auth" = [])),
    params(("tenant_id" = Uuid, Path, description = "Tenant identifier")),
    request_body = UpdateApiKeyDto,
    responses(
        (status = 200, description = "API key updated", body = TenantDto),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn update_api_key(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<UpdateApiKeyDto>,
) -> Result<Json<TenantDto>, ApiError> {
    let tenants = TenantRepository::new(&state.db);
    let tenant = tenants
        .update_api_key(tenant_id, &request.api_key, state.crypto_key.as_deref())
        .await?;
    Ok(Json(tenant.into()))
}

/// Delete a tenant and everything it owns
#[utoipa::path(
    delete,
    path = "/api/v1/tenants/{tenant_id}",
    security(("bearer_auth" = [])),
    params(("tenant_id" = Uuid, Path, description = "Tenant identifier")),
    responses(
        (status = 204, description = "Tenant deleted"),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn delete_tenant(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenants = TenantRepository::new(&state.db);
    tenants.delete_tenant(tenant_id).await?;
    state.cache.invalidate_tenant(tenant_id);
    Ok(StatusCode::NO_CONTENT)
}
