//! Integration tests for the HTTP API surface.

mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use flowmetrics::config::AppConfig;
use flowmetrics::query::MetricsCache;
use flowmetrics::server::{AppState, create_app};
use flowmetrics::sync::SyncStateRepository;

use test_utils::*;

const OPERATOR_TOKEN: &str = "test-operator-token";

/// Starts the full application on a random port, backed by in-memory SQLite.
/// Returns the base URL and a handle to the underlying database.
async fn start_test_server() -> (String, DatabaseConnection) {
    let db = setup_test_db().await.unwrap();

    let mut config = AppConfig::default();
    config.operator_tokens = vec![OPERATOR_TOKEN.to_string()];
    let cache = Arc::new(MetricsCache::new(&config.cache));

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        cache,
        crypto_key: None,
    };
    let app = create_app(state);

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), db)
}

fn authed(client: &Client, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
    client.request(method, url).bearer_auth(OPERATOR_TOKEN)
}

#[tokio::test]
async fn root_reports_service_info() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], "flowmetrics");
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{base}/api/v1/tenants"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{base}/api/v1/tenants"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
}

#[tokio::test]
async fn tenant_lifecycle_roundtrip() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    // Create
    let response = authed(&client, reqwest::Method::POST, format!("{base}/api/v1/tenants"))
        .json(&json!({
            "name": "Acme Corp",
            "base_url": "https://n8n.acme.example",
            "api_key": "n8n-key",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["name"], "Acme Corp");
    assert_eq!(created["has_api_key"], true);
    assert!(created.get("api_key").is_none());
    let tenant_id = created["id"].as_str().unwrap().to_string();

    // List
    let response = authed(&client, reqwest::Method::GET, format!("{base}/api/v1/tenants"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let listed: Value = response.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Get
    let response = authed(
        &client,
        reqwest::Method::GET,
        format!("{base}/api/v1/tenants/{tenant_id}"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    // Rotate key
    let response = authed(
        &client,
        reqwest::Method::PUT,
        format!("{base}/api/v1/tenants/{tenant_id}/api-key"),
    )
    .json(&json!({"api_key": "rotated-key"}))
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    // Delete
    let response = authed(
        &client,
        reqwest::Method::DELETE,
        format!("{base}/api/v1/tenants/{tenant_id}"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 204);

    let response = authed(
        &client,
        reqwest::Method::GET,
        format!("{base}/api/v1/tenants/{tenant_id}"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn invalid_tenant_payload_is_rejected() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = authed(&client, reqwest::Method::POST, format!("{base}/api/v1/tenants"))
        .json(&json!({
            "name": "",
            "base_url": "ftp://not-http.example",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn metrics_summary_for_unknown_tenant_is_404() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = authed(
        &client,
        reqwest::Method::GET,
        format!("{base}/api/v1/tenants/{}/metrics", uuid::Uuid::new_v4()),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn manual_sync_runs_against_the_remote_instance() {
    let remote = wiremock::MockServer::start().await;
    stub_workflows(
        &remote,
        vec![workflow_json("wf-1", "Orders", true, &["production"])],
    )
    .await;
    stub_executions(
        &remote,
        vec![execution_json(
            "ex-1",
            "wf-1",
            Some("success"),
            "trigger",
            true,
            Utc::now() - Duration::minutes(10),
        )],
    )
    .await;

    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = authed(&client, reqwest::Method::POST, format!("{base}/api/v1/tenants"))
        .json(&json!({
            "name": "Acme Corp",
            "base_url": remote.uri(),
            "api_key": "n8n-key",
        }))
        .send()
        .await
        .unwrap();
    let tenant_id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = authed(
        &client,
        reqwest::Method::POST,
        format!("{base}/api/v1/tenants/{tenant_id}/sync"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["workflows_synced"], 1);
    assert_eq!(report["executions_synced"], 1);
    assert_eq!(report["skipped_locked"], false);

    let response = authed(
        &client,
        reqwest::Method::GET,
        format!("{base}/api/v1/tenants/{tenant_id}/metrics"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["total_executions"], 1);
    assert_eq!(summary["connection_healthy"], true);
}

#[tokio::test]
async fn manual_sync_conflicts_while_another_run_holds_the_lock() {
    let (base, db) = start_test_server().await;
    let client = Client::new();

    let response = authed(&client, reqwest::Method::POST, format!("{base}/api/v1/tenants"))
        .json(&json!({
            "name": "Acme Corp",
            "base_url": "https://n8n.acme.example",
            "api_key": "n8n-key",
        }))
        .send()
        .await
        .unwrap();
    let tenant_id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let tenant_uuid = uuid::Uuid::parse_str(&tenant_id).unwrap();

    // Another worker holds the tenant's sync lock.
    let states = SyncStateRepository::new(&db);
    assert!(states.try_acquire_lock(tenant_uuid, 600).await.unwrap());

    let response = authed(
        &client,
        reqwest::Method::POST,
        format!("{base}/api/v1/tenants/{tenant_id}/sync"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(response.headers().get("retry-after").unwrap(), "30");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "SYNC_IN_PROGRESS");
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let (base, _db) = start_test_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{base}/openapi.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let spec: Value = response.json().await.unwrap();
    assert_eq!(spec["info"]["title"], "FlowMetrics API");
    assert!(spec["paths"].get("/api/v1/tenants").is_some());
}
