use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use vault_db::MemoryStore;
use vault_events::DeliveryPolicy;
use vault_server::{app, AppState};

async fn serve(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Generous enough to cover one SSE keep-alive interval, after which a
/// write to a closed connection is guaranteed to surface.
async fn wait_for_subscriptions(state: &AppState, tenant_id: &str, expected: usize) {
    tokio::time::timeout(Duration::from_secs(20), async {
        while state.updater.registry().subscription_count(tenant_id).await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription count should settle");
}

async fn next_data_chunk(response: &mut reqwest::Response) -> String {
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("timed out waiting for SSE data")
            .expect("Failed to read chunk")
            .expect("Stream closed");
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        if text.contains("data:") {
            return text;
        }
    }
}

#[tokio::test]
async fn test_sse_stream_delivers_bridge_events() {
    let state = AppState::new(Arc::new(MemoryStore::new()), DeliveryPolicy::default());
    let server_url = serve(state.clone()).await;
    let client = reqwest::Client::new();

    let mut response = client
        .get(format!("{}/api/tenants/t1/events/stream", server_url))
        .send()
        .await
        .expect("Failed to connect to SSE stream");
    assert!(response.status().is_success());

    wait_for_subscriptions(&state, "t1", 1).await;

    let callback = client
        .post(format!("{}/agency/t1/message", server_url))
        .json(&json!({
            "jobId": "m1",
            "connectionId": "conn-1",
            "text": "hello",
            "sentByUs": false
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(callback.status(), reqwest::StatusCode::ACCEPTED);

    let chunk = next_data_chunk(&mut response).await;
    assert!(chunk.contains("Received message hello"));
    assert!(chunk.contains("\"jobId\":\"m1\""));
    assert!(!chunk.contains("tenantId"));
}

#[tokio::test]
async fn test_sse_stream_ignores_other_tenants() {
    let state = AppState::new(Arc::new(MemoryStore::new()), DeliveryPolicy::default());
    let server_url = serve(state.clone()).await;
    let client = reqwest::Client::new();

    let mut response = client
        .get(format!("{}/api/tenants/t1/events/stream", server_url))
        .send()
        .await
        .unwrap();
    wait_for_subscriptions(&state, "t1", 1).await;

    for (tenant, job) in [("t2", "other"), ("t1", "mine")] {
        client
            .post(format!("{}/api/tenants/{}/invitations", server_url, tenant))
            .json(&json!({ "jobId": job }))
            .send()
            .await
            .unwrap();
    }

    let chunk = next_data_chunk(&mut response).await;
    assert!(chunk.contains("\"jobId\":\"mine\""));
    assert!(!chunk.contains("other"));
}

#[tokio::test]
async fn test_sse_disconnect_removes_subscription() {
    let state = AppState::new(Arc::new(MemoryStore::new()), DeliveryPolicy::default());
    let server_url = serve(state.clone()).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/tenants/t1/events/stream", server_url))
        .send()
        .await
        .unwrap();
    wait_for_subscriptions(&state, "t1", 1).await;

    drop(response);

    wait_for_subscriptions(&state, "t1", 0).await;
}
