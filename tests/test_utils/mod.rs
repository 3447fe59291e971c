//! Test utilities for database and remote-API testing.
//!
//! Provides in-memory SQLite databases with migrations applied, fixture
//! seeding helpers, and wiremock stubs shaped like the n8n REST API.

use anyhow::Result;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowmetrics::config::SyncConfig;
use flowmetrics::models::{execution, workflow};
use flowmetrics::repositories::{TenantRepository, tenant::CreateTenantRequest};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Default sync configuration for tests.
#[allow(dead_code)]
pub fn test_sync_config() -> SyncConfig {
    SyncConfig::default()
}

/// Creates a tenant pointing at the given base URL, with a plaintext API key.
#[allow(dead_code)]
pub async fn create_test_tenant(db: &DatabaseConnection, base_url: &str) -> Result<Uuid> {
    let tenants = TenantRepository::new(db);
    let tenant = tenants
        .create_tenant(
            CreateTenantRequest {
                name: "Test Tenant".to_string(),
                base_url: base_url.to_string(),
                api_key: Some("test-api-key".to_string()),
                custom_filters: None,
            },
            None,
        )
        .await?;
    Ok(tenant.id)
}

/// Inserts a workflow row directly, bypassing the sync pipeline.
#[allow(dead_code)]
pub async fn seed_workflow(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    remote_id: &str,
    name: &str,
    active: bool,
) -> Result<Uuid> {
    let now = Utc::now();
    let model = workflow::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        remote_workflow_id: Set(remote_id.to_string()),
        name: Set(name.to_string()),
        active: Set(active),
        archived: Set(false),
        node_count: Set(3),
        connection_count: Set(2),
        time_saved_per_execution_minutes: Set(30),
        remote_created_at: Set(None),
        remote_updated_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let inserted = model.insert(db).await?;
    Ok(inserted.id)
}

/// Inserts an execution fact directly, bypassing the sync pipeline.
#[allow(dead_code)]
#[allow(clippy::too_many_arguments)]
pub async fn seed_execution(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    workflow_id: Uuid,
    remote_id: &str,
    status: &str,
    started_at: DateTime<Utc>,
    duration_ms: Option<i64>,
    error_message: Option<&str>,
) -> Result<Uuid> {
    let now = Utc::now();
    let model = execution::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        workflow_id: Set(workflow_id),
        remote_execution_id: Set(remote_id.to_string()),
        status: Set(status.to_string()),
        mode: Set("trigger".to_string()),
        finished: Set(status == "success" || status == "error"),
        started_at: Set(Some(started_at.into())),
        stopped_at: Set(duration_ms
            .map(|ms| (started_at + chrono::Duration::milliseconds(ms)).into())),
        execution_time_ms: Set(duration_ms),
        is_production: Set(true),
        error_message: Set(error_message.map(|s| s.to_string())),
        data_size_bytes: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let inserted = model.insert(db).await?;
    Ok(inserted.id)
}

/// JSON fixture for a remote workflow.
#[allow(dead_code)]
pub fn workflow_json(id: &str, name: &str, active: bool, tags: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "active": active,
        "nodes": [
            {"name": "Start", "type": "n8n-nodes-base.start"},
            {"name": "HTTP", "type": "n8n-nodes-base.httpRequest"}
        ],
        "connections": {"Start": {}},
        "tags": tags.iter().map(|t| json!({"id": null, "name": t})).collect::<Vec<_>>(),
    })
}

/// JSON fixture for a remote execution.
#[allow(dead_code)]
pub fn execution_json(
    id: &str,
    workflow_id: &str,
    status: Option<&str>,
    mode: &str,
    finished: bool,
    started_at: DateTime<Utc>,
) -> Value {
    json!({
        "id": id,
        "workflowId": workflow_id,
        "status": status,
        "mode": mode,
        "finished": finished,
        "startedAt": started_at.to_rfc3339(),
        "stoppedAt": if finished { Some((started_at + chrono::Duration::seconds(2)).to_rfc3339()) } else { None },
    })
}

/// JSON fixture for a failed remote execution carrying its result payload.
#[allow(dead_code)]
pub fn failed_execution_json(
    id: &str,
    workflow_id: &str,
    started_at: DateTime<Utc>,
    error_message: &str,
) -> Value {
    json!({
        "id": id,
        "workflowId": workflow_id,
        "status": "error",
        "mode": "trigger",
        "finished": false,
        "startedAt": started_at.to_rfc3339(),
        "stoppedAt": (started_at + chrono::Duration::seconds(2)).to_rfc3339(),
        "data": {
            "resultData": {
                "error": {"message": error_message, "name": "NodeApiError"},
                "runData": {}
            }
        },
    })
}

/// Mounts a single-page workflows response on the mock n8n server.
#[allow(dead_code)]
pub async fn stub_workflows(server: &MockServer, workflows: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/v1/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": workflows,
            "nextCursor": null,
        })))
        .mount(server)
        .await;
}

/// Mounts a single-page executions response on the mock n8n server.
#[allow(dead_code)]
pub async fn stub_executions(server: &MockServer, executions: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/v1/executions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": executions,
            "nextCursor": null,
        })))
        .mount(server)
        .await;
}
