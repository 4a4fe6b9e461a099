use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vault_db::{MemoryStore, SqliteSettings, SqliteStore, Store};
use vault_events::DeliveryPolicy;
use vault_server::{app, AppState};

fn memory_app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), DeliveryPolicy::default());
    (store, app(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn connection_body(job_id: &str) -> Value {
    json!({
        "jobId": job_id,
        "connectionId": "conn-1",
        "ourDid": "did:our",
        "theirDid": "did:their",
        "theirEndpoint": "http://their.example",
        "theirLabel": "Bob"
    })
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (_, app) = memory_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn invitation_completes_when_the_connection_arrives() {
    let (_, app) = memory_app();

    let (status, job) = send(
        &app,
        "POST",
        "/api/tenants/t1/invitations",
        Some(json!({ "jobId": "job-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "WAITING");
    assert_eq!(job["protocolType"], "CONNECTION");

    let (status, body) = send(
        &app,
        "POST",
        "/agency/t1/connection",
        Some(connection_body("job-1")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "processed");
    assert_eq!(body["status"], "COMPLETED");

    let (status, job) = send(&app, "GET", "/api/tenants/t1/jobs/job-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["result"], "SUCCESS");
    assert_eq!(job["connectionId"], "conn-1");

    let (_, events) = send(&app, "GET", "/api/tenants/t1/events", None).await;
    assert_eq!(events["count"], 2);
    assert_eq!(events["events"][0]["description"], "Established connection to Bob");
    assert_eq!(events["events"][1]["description"], "Created invitation");
}

#[tokio::test]
async fn invitation_without_body_generates_a_job_id() {
    let (_, app) = memory_app();

    let (status, job) = send(&app, "POST", "/api/tenants/t1/invitations", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!job["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_invitation_conflicts() {
    let (_, app) = memory_app();
    let body = json!({ "jobId": "job-1" });

    send(&app, "POST", "/api/tenants/t1/invitations", Some(body.clone())).await;
    let (status, json) = send(&app, "POST", "/api/tenants/t1/invitations", Some(body)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn jobs_are_scoped_to_their_tenant() {
    let (_, app) = memory_app();
    send(
        &app,
        "POST",
        "/api/tenants/t1/invitations",
        Some(json!({ "jobId": "job-1" })),
    )
    .await;

    let (status, _) = send(&app, "GET", "/api/tenants/t2/jobs/job-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credential_callbacks_drive_the_job() {
    let (_, app) = memory_app();

    let (status, body) = send(
        &app,
        "POST",
        "/agency/t1/credential",
        Some(json!({
            "jobId": "cred-job",
            "connectionId": "conn-1",
            "role": "HOLDER",
            "schemaId": "schema:email",
            "credDefId": "cred-def:1",
            "attributes": [{ "name": "email", "value": "alice@example.com" }],
            "initiatedByUs": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "PENDING");

    let (status, body) = send(
        &app,
        "POST",
        "/agency/t1/credential/update",
        Some(json!({
            "jobId": "cred-job",
            "connectionId": "conn-1",
            "failedAt": "2024-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["result"], "FAILURE");

    let (status, body) = send(
        &app,
        "POST",
        "/agency/t1/credential/update",
        Some(json!({
            "jobId": "cred-job",
            "connectionId": "conn-1",
            "issuedAt": "2024-01-02T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "unchanged");
}

#[tokio::test]
async fn message_update_is_not_implemented() {
    let (_, app) = memory_app();

    let (status, json) = send(
        &app,
        "POST",
        "/agency/t1/message/update",
        Some(json!({ "jobId": "m1", "connectionId": "conn-1", "delivered": true })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(json["error"].as_str().unwrap().contains("not supported"));
}

#[tokio::test]
async fn failed_callback_is_unprocessable() {
    let (store, app) = memory_app();

    let (status, json) = send(
        &app,
        "POST",
        "/agency/t1/proof/update",
        Some(json!({
            "jobId": "missing",
            "connectionId": "conn-1",
            "verifiedAt": "2024-01-01T00:00:00Z"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].is_string());
    assert_eq!(store.event_count(), 0);
}

#[tokio::test]
async fn events_can_be_marked_read() {
    let (store, app) = memory_app();
    send(
        &app,
        "POST",
        "/agency/t1/message",
        Some(json!({
            "jobId": "m1",
            "connectionId": "conn-1",
            "text": "hi",
            "sentByUs": true
        })),
    )
    .await;
    let event_id = store.list_events("t1", 1).unwrap()[0].id.clone();

    let (status, event) = send(
        &app,
        "POST",
        &format!("/api/tenants/t1/events/{event_id}/read"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["read"], true);
    assert_eq!(event["description"], "Sent message hi");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/tenants/t2/events/{event_id}/read"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_limit_is_clamped() {
    let (_, app) = memory_app();
    for i in 0..3 {
        send(
            &app,
            "POST",
            "/api/tenants/t1/invitations",
            Some(json!({ "jobId": format!("job-{i}") })),
        )
        .await;
    }

    let (_, events) = send(&app, "GET", "/api/tenants/t1/events?limit=0", None).await;
    assert_eq!(events["count"], 1);

    let (_, events) = send(&app, "GET", "/api/tenants/t1/events?limit=2", None).await;
    assert_eq!(events["count"], 2);

    let (_, events) = send(&app, "GET", "/api/tenants/t1/events?limit=5000", None).await;
    assert_eq!(events["count"], 3);
}

#[tokio::test]
async fn sqlite_backed_state_persists_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let store = Arc::new(SqliteStore::open(&path, SqliteSettings::default()).unwrap());
    let app = app(AppState::new(store.clone(), DeliveryPolicy::default()));

    let (status, _) = send(
        &app,
        "POST",
        "/api/tenants/t1/invitations",
        Some(json!({ "jobId": "job-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        "/agency/t1/connection",
        Some(connection_body("job-1")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "body: {body}");

    let job = store.get_job("t1", "job-1").unwrap();
    assert_eq!(job.connection_id.as_deref(), Some("conn-1"));
    assert_eq!(store.list_events("t1", 10).unwrap().len(), 2);
}

#[tokio::test]
async fn jobs_and_connections_can_be_read_back() {
    let (_, app) = memory_app();
    send(
        &app,
        "POST",
        "/api/tenants/t1/invitations",
        Some(json!({ "jobId": "job-1" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/agency/t1/connection",
        Some(connection_body("job-1")),
    )
    .await;

    let (status, jobs) = send(&app, "GET", "/api/tenants/t1/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs["count"], 1);
    assert_eq!(jobs["jobs"][0]["id"], "job-1");

    let (status, connection) =
        send(&app, "GET", "/api/tenants/t1/connections/conn-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(connection["theirLabel"], "Bob");
    assert_eq!(connection["invited"], true);

    let (status, _) = send(&app, "GET", "/api/tenants/t2/connections/conn-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, jobs) = send(&app, "GET", "/api/tenants/t2/jobs", None).await;
    assert_eq!(jobs["count"], 0);
}

#[tokio::test]
async fn redelivered_connection_callback_is_unchanged() {
    let (store, app) = memory_app();
    send(
        &app,
        "POST",
        "/api/tenants/t1/invitations",
        Some(json!({ "jobId": "job-1" })),
    )
    .await;

    for expected in ["processed", "unchanged"] {
        let (status, body) = send(
            &app,
            "POST",
            "/agency/t1/connection",
            Some(connection_body("job-1")),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["outcome"], expected);
    }
    assert_eq!(store.event_count(), 2);
}
