//! Vault server library logic.

pub mod api;
pub mod api_agency;
pub mod api_events;
pub mod api_jobs;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use vault_db::Store;
use vault_events::{DeliveryPolicy, SubscriberRegistry, Updater};
use vault_listener::Listener;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Journal writes and live subscriptions.
    pub updater: Updater,
    /// Protocol bridge fed by the agency callbacks.
    pub listener: Listener,
}

impl AppState {
    /// Wires a fresh subscriber registry with `policy` between `store`, the
    /// updater and the listener. Handlers reach `store` through the updater.
    pub fn new(store: Arc<dyn Store>, policy: DeliveryPolicy) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(policy));
        let updater = Updater::new(store, registry);
        let listener = Listener::new(updater.clone());
        Self { updater, listener }
    }
}

/// Maximum request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let agency_routes = Router::new()
        .route(
            "/agency/{tenantId}/connection",
            post(api_agency::connection_handler),
        )
        .route("/agency/{tenantId}/message", post(api_agency::message_handler))
        .route(
            "/agency/{tenantId}/message/update",
            post(api_agency::message_update_handler),
        )
        .route(
            "/agency/{tenantId}/credential",
            post(api_agency::credential_handler),
        )
        .route(
            "/agency/{tenantId}/credential/update",
            post(api_agency::credential_update_handler),
        )
        .route("/agency/{tenantId}/proof", post(api_agency::proof_handler))
        .route(
            "/agency/{tenantId}/proof/update",
            post(api_agency::proof_update_handler),
        );

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/tenants/{tenantId}/invitations",
            post(api_jobs::create_invitation_handler),
        )
        .route(
            "/api/tenants/{tenantId}/jobs",
            get(api_jobs::list_jobs_handler),
        )
        .route(
            "/api/tenants/{tenantId}/jobs/{jobId}",
            get(api_jobs::get_job_handler),
        )
        .route(
            "/api/tenants/{tenantId}/connections/{connectionId}",
            get(api_jobs::get_connection_handler),
        )
        .route(
            "/api/tenants/{tenantId}/events",
            get(api_events::list_events_handler),
        )
        .route(
            "/api/tenants/{tenantId}/events/stream",
            get(api_events::event_stream_handler),
        )
        .route(
            "/api/tenants/{tenantId}/events/{eventId}/read",
            post(api_events::mark_read_handler),
        )
        .merge(agency_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
