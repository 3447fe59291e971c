//! Integration tests for the tenant sync engine against a mock n8n API.

mod test_utils;

use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowmetrics::models::execution::{Column as ExecutionColumn, Entity as Execution};
use flowmetrics::models::workflow::Entity as Workflow;
use flowmetrics::sync::{MetricsSyncEngine, SyncStateRepository};

use test_utils::*;

#[tokio::test]
async fn full_sync_persists_workflows_and_classifies_executions() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let started = Utc::now() - Duration::minutes(10);
    stub_workflows(
        &server,
        vec![
            workflow_json("wf-1", "Order Processing", true, &["production"]),
            workflow_json("wf-2", "Order Processing Test Copy", true, &[]),
        ],
    )
    .await;
    stub_executions(
        &server,
        vec![
            execution_json("ex-1", "wf-1", Some("success"), "trigger", true, started),
            execution_json("ex-2", "wf-1", Some("error"), "webhook", true, started),
            execution_json("ex-3", "wf-1", Some("success"), "manual", true, started),
            execution_json("ex-4", "wf-2", Some("success"), "trigger", true, started),
        ],
    )
    .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    let report = engine.sync_tenant(tenant_id).await.unwrap();

    assert!(!report.skipped_locked);
    assert_eq!(report.workflows_synced, 2);
    // ex-1 and ex-2 are production; ex-3 is manual, ex-4 ran on a
    // test-named untagged workflow.
    assert_eq!(report.executions_synced, 2);
    assert_eq!(report.executions_filtered, 2);
    assert!(report.errors.is_empty());

    assert_eq!(Workflow::find().count(&db).await.unwrap(), 2);
    let stored = Execution::find()
        .filter(ExecutionColumn::IsProduction.eq(true))
        .all(&db)
        .await
        .unwrap();
    let mut remote_ids: Vec<_> = stored.iter().map(|e| e.remote_execution_id.as_str()).collect();
    remote_ids.sort_unstable();
    assert_eq!(remote_ids, vec!["ex-1", "ex-2"]);
}

#[tokio::test]
async fn resync_is_idempotent() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let started = Utc::now() - Duration::minutes(5);
    stub_workflows(&server, vec![workflow_json("wf-1", "Billing", true, &["prod"])]).await;
    stub_executions(
        &server,
        vec![execution_json("ex-1", "wf-1", Some("success"), "trigger", true, started)],
    )
    .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    engine.sync_tenant(tenant_id).await.unwrap();
    engine.sync_tenant(tenant_id).await.unwrap();

    assert_eq!(Workflow::find().count(&db).await.unwrap(), 1);
    assert_eq!(Execution::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn running_execution_is_updated_in_place_when_it_finishes() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let started = Utc::now() - Duration::minutes(5);
    stub_workflows(&server, vec![workflow_json("wf-1", "Billing", true, &["prod"])]).await;

    // First observation: remote reports it as running even though both
    // timestamps are already present.
    let running = Mock::given(method("GET"))
        .and(path("/api/v1/executions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "id": "ex-1",
                "workflowId": "wf-1",
                "status": "running",
                "mode": "trigger",
                "finished": false,
                "startedAt": started.to_rfc3339(),
                "stoppedAt": (started + Duration::seconds(2)).to_rfc3339(),
            }],
            "nextCursor": null,
        })))
        .up_to_n_times(1)
        .mount_as_scoped(&server)
        .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    engine.sync_tenant(tenant_id).await.unwrap();
    drop(running);

    let row = Execution::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, "running");
    assert!(!row.finished);

    // Second observation: same remote id, now finished.
    stub_executions(
        &server,
        vec![execution_json("ex-1", "wf-1", Some("success"), "trigger", true, started)],
    )
    .await;
    engine.sync_tenant(tenant_id).await.unwrap();

    assert_eq!(Execution::find().count(&db).await.unwrap(), 1);
    let row = Execution::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, "success");
    assert!(row.finished);
}

#[tokio::test]
async fn error_text_and_payload_size_are_persisted_for_failed_executions() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let started = Utc::now() - Duration::minutes(5);
    stub_workflows(&server, vec![workflow_json("wf-1", "Billing", true, &["prod"])]).await;
    let failed = Mock::given(method("GET"))
        .and(path("/api/v1/executions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [failed_execution_json("ex-1", "wf-1", started, "timeout contacting CRM")],
            "nextCursor": null,
        })))
        .up_to_n_times(1)
        .mount_as_scoped(&server)
        .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    engine.sync_tenant(tenant_id).await.unwrap();
    drop(failed);

    let row = Execution::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, "error");
    assert_eq!(row.error_message.as_deref(), Some("timeout contacting CRM"));
    assert!(row.data_size_bytes.unwrap() > 0);

    // A later observation without the result payload keeps what is on
    // record instead of blanking it.
    stub_executions(
        &server,
        vec![execution_json("ex-1", "wf-1", Some("error"), "trigger", true, started)],
    )
    .await;
    engine.sync_tenant(tenant_id).await.unwrap();

    let row = Execution::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.error_message.as_deref(), Some("timeout contacting CRM"));
    assert!(row.data_size_bytes.unwrap() > 0);
}

#[tokio::test]
async fn executions_flagged_by_their_error_text_are_filtered() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let started = Utc::now() - Duration::minutes(5);
    // A neutral workflow name so the verdict falls through to the error
    // text.
    stub_workflows(&server, vec![workflow_json("wf-1", "Order Pipeline", true, &[])]).await;
    stub_executions(
        &server,
        vec![
            failed_execution_json("ex-1", "wf-1", started, "aborted: test_mode enabled"),
            failed_execution_json("ex-2", "wf-1", started, "upstream returned 500"),
        ],
    )
    .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    let report = engine.sync_tenant(tenant_id).await.unwrap();

    assert_eq!(report.executions_synced, 1);
    assert_eq!(report.executions_filtered, 1);
    let row = Execution::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.remote_execution_id, "ex-2");
    assert_eq!(row.error_message.as_deref(), Some("upstream returned 500"));
}

#[tokio::test]
async fn concurrent_sync_is_a_noop_while_lock_is_held() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let states = SyncStateRepository::new(&db);
    assert!(states.try_acquire_lock(tenant_id, 600).await.unwrap());

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    let report = engine.sync_tenant(tenant_id).await.unwrap();

    assert!(report.skipped_locked);
    assert_eq!(report.executions_synced, 0);
    assert_eq!(Execution::find().count(&db).await.unwrap(), 0);

    // Once released, the same call syncs normally.
    states.release_lock(tenant_id).await.unwrap();
    stub_workflows(&server, vec![workflow_json("wf-1", "Billing", true, &["prod"])]).await;
    stub_executions(&server, vec![]).await;
    let report = engine.sync_tenant(tenant_id).await.unwrap();
    assert!(!report.skipped_locked);
    assert_eq!(report.workflows_synced, 1);
}

#[tokio::test]
async fn checkpoint_advances_after_successful_sync() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    let newest = Utc::now() - Duration::minutes(2);
    let oldest = Utc::now() - Duration::hours(3);
    stub_workflows(&server, vec![workflow_json("wf-1", "Billing", true, &["prod"])]).await;
    stub_executions(
        &server,
        vec![
            execution_json("ex-new", "wf-1", Some("success"), "trigger", true, newest),
            execution_json("ex-old", "wf-1", Some("error"), "trigger", true, oldest),
        ],
    )
    .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    engine.sync_tenant(tenant_id).await.unwrap();

    let states = SyncStateRepository::new(&db);
    let state = states.get(tenant_id).await.unwrap().unwrap();
    assert!(state.last_execution_sync.is_some());
    assert!(state.last_error.is_none());
    assert_eq!(state.executions_synced, 2);

    let newest_seen = state.newest_execution_date.unwrap().with_timezone(&Utc);
    let oldest_seen = state.oldest_execution_date.unwrap().with_timezone(&Utc);
    assert!((newest_seen - newest).num_seconds().abs() < 2);
    assert!((oldest_seen - oldest).num_seconds().abs() < 2);
}

#[tokio::test]
async fn checkpoint_execution_range_never_shrinks() {
    let db = setup_test_db().await.unwrap();
    let tenant_id = create_test_tenant(&db, "https://n8n.example.com")
        .await
        .unwrap();
    let states = SyncStateRepository::new(&db);

    let newest = Utc::now() - Duration::hours(1);
    let oldest = Utc::now() - Duration::hours(6);
    states
        .record_execution_sync(tenant_id, 2, Some(newest), Some(oldest), Some("ex-20".into()))
        .await
        .unwrap();

    // A later run over an overlap window only reports older executions.
    let stale_newest = newest - Duration::hours(2);
    let earlier_oldest = oldest - Duration::hours(2);
    let state = states
        .record_execution_sync(
            tenant_id,
            1,
            Some(stale_newest),
            Some(earlier_oldest),
            Some("ex-7".into()),
        )
        .await
        .unwrap();

    // The newest edge holds; the oldest edge widens.
    let newest_seen = state.newest_execution_date.unwrap().with_timezone(&Utc);
    let oldest_seen = state.oldest_execution_date.unwrap().with_timezone(&Utc);
    assert!((newest_seen - newest).num_seconds().abs() < 2);
    assert!((oldest_seen - earlier_oldest).num_seconds().abs() < 2);
    assert_eq!(state.executions_synced, 3);
}

#[tokio::test]
async fn rejected_credentials_fail_the_run_and_record_the_error() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let tenant_id = create_test_tenant(&db, &server.uri()).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/workflows"))
        .and(header("X-N8N-API-KEY", "test-api-key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let config = test_sync_config();
    let engine = MetricsSyncEngine::new(&db, &config, None);
    let result = engine.sync_tenant(tenant_id).await;
    assert!(matches!(
        result,
        Err(flowmetrics::error::SyncError::Configuration(_))
    ));

    let states = SyncStateRepository::new(&db);
    let state = states.get(tenant_id).await.unwrap().unwrap();
    assert!(state.last_error.is_some());
    assert!(state.last_error_at.is_some());
    // The lock is released even on failure.
    assert!(states.try_acquire_lock(tenant_id, 600).await.unwrap());
}
