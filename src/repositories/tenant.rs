//! # Tenant Repository
//!
//! CRUD operations for tenants. A tenant owns one n8n instance: a base URL
//! plus an encrypted API key.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set,
};
use url::Url;
use uuid::Uuid;

use crate::crypto::{self, CryptoKey};
use crate::error::RepositoryError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Entity as Tenant, Model as TenantModel,
};
use crate::sync::filter::CustomFilters;

/// Request data for creating a new tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    /// Display name for the tenant
    pub name: String,
    /// Base URL of the tenant's n8n instance
    pub base_url: String,
    /// Plaintext n8n API key, encrypted at rest
    pub api_key: Option<String>,
    /// Production-filter overrides
    pub custom_filters: Option<CustomFilters>,
}

/// Repository for Tenant database operations
pub struct TenantRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TenantRepository<'a> {
    /// Create a new TenantRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new tenant, encrypting the API key when a crypto key is
    /// configured.
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
        crypto_key: Option<&CryptoKey>,
    ) -> Result<TenantModel, RepositoryError> {
        Self::validate_name(&request.name)?;
        Self::validate_base_url(&request.base_url)?;

        let tenant_id = Uuid::new_v4();
        let now = Utc::now();

        let api_key_ciphertext = request
            .api_key
            .as_deref()
            .map(|api_key| Self::seal_api_key(tenant_id, &request.base_url, api_key, crypto_key))
            .transpose()?;

        let custom_filters = request
            .custom_filters
            .map(|filters| {
                serde_json::to_value(filters)
                    .map_err(|e| RepositoryError::Validation(format!("invalid custom filters: {e}")))
            })
            .transpose()?;

        let tenant = TenantActiveModel {
            id: Set(tenant_id),
            name: Set(request.name),
            base_url: Set(request.base_url.trim_end_matches('/').to_string()),
            api_key_ciphertext: Set(api_key_ciphertext),
            custom_filters: Set(custom_filters),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Ok(tenant.insert(self.db).await?)
    }

    /// Get tenant by ID
    pub async fn get_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Ok(Tenant::find_by_id(tenant_id).one(self.db).await?)
    }

    /// List all tenants
    pub async fn list_tenants(&self) -> Result<Vec<TenantModel>, RepositoryError> {
        Ok(Tenant::find().all(self.db).await?)
    }

    /// Replace the tenant's API key.
    pub async fn update_api_key(
        &self,
        tenant_id: Uuid,
        api_key: &str,
        crypto_key: Option<&CryptoKey>,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tenant {tenant_id} not found")))?;

        let ciphertext = Self::seal_api_key(tenant.id, &tenant.base_url, api_key, crypto_key)?;

        let mut active = tenant.into_active_model();
        active.api_key_ciphertext = Set(Some(ciphertext));
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }

    /// Delete a tenant. Workflows, executions, sync state, and aggregations
    /// cascade with it.
    pub async fn delete_tenant(&self, tenant_id: Uuid) -> Result<(), RepositoryError> {
        let result = Tenant::delete_by_id(tenant_id).exec(self.db).await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!(
                "tenant {tenant_id} not found"
            )));
        }
        Ok(())
    }

    /// Decrypt the tenant's stored API key.
    pub fn resolve_api_key(
        tenant: &TenantModel,
        crypto_key: Option<&CryptoKey>,
    ) -> Result<Option<String>, RepositoryError> {
        let Some(ciphertext) = tenant.api_key_ciphertext.as_deref() else {
            return Ok(None);
        };

        match crypto_key {
            Some(key) => crypto::decrypt_tenant_api_key(key, tenant.id, &tenant.base_url, ciphertext)
                .map(Some)
                .map_err(|e| RepositoryError::Validation(format!("stored API key unreadable: {e}"))),
            // Without a crypto key, only legacy plaintext payloads are usable.
            None if !crypto::is_encrypted_payload(ciphertext) => {
                String::from_utf8(ciphertext.to_vec()).map(Some).map_err(|e| {
                    RepositoryError::Validation(format!("stored API key unreadable: {e}"))
                })
            }
            None => Err(RepositoryError::Validation(
                "API key is encrypted but no crypto key is configured".to_string(),
            )),
        }
    }

    /// Parse the tenant's stored custom-filter overrides.
    pub fn resolve_custom_filters(tenant: &TenantModel) -> Option<CustomFilters> {
        tenant
            .custom_filters
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    fn seal_api_key(
        tenant_id: Uuid,
        base_url: &str,
        api_key: &str,
        crypto_key: Option<&CryptoKey>,
    ) -> Result<Vec<u8>, RepositoryError> {
        match crypto_key {
            Some(key) => crypto::encrypt_tenant_api_key(
                key,
                tenant_id,
                base_url.trim_end_matches('/'),
                api_key,
            )
            .map_err(|e| RepositoryError::Validation(format!("failed to encrypt API key: {e}"))),
            None => Ok(api_key.as_bytes().to_vec()),
        }
    }

    fn validate_name(name: &str) -> Result<(), RepositoryError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RepositoryError::Validation(
                "tenant name cannot be empty".to_string(),
            ));
        }
        if trimmed.len() > 255 {
            return Err(RepositoryError::Validation(
                "tenant name cannot exceed 255 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_base_url(base_url: &str) -> Result<(), RepositoryError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| RepositoryError::Validation(format!("invalid base URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RepositoryError::Validation(
                "base URL must use http or https".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(TenantRepository::validate_name("Acme").is_ok());
        assert!(TenantRepository::validate_name("  ").is_err());
        assert!(TenantRepository::validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn base_url_validation() {
        assert!(TenantRepository::validate_base_url("https://n8n.acme.io").is_ok());
        assert!(TenantRepository::validate_base_url("ftp://n8n.acme.io").is_err());
        assert!(TenantRepository::validate_base_url("not a url").is_err());
    }
}
