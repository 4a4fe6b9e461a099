//! Callback endpoints for the protocol agency.
//!
//! Every body carries `jobId` and `connectionId` next to the
//! protocol-specific fields; the tenant comes from the path. Responses:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | processed / unchanged | `202 Accepted` |
//! | unsupported | `501 Not Implemented` |
//! | failed | `422 Unprocessable Entity` |

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use vault_listener::CallbackOutcome;
use vault_types::{
    ConnectionPayload, CredentialPayload, CredentialUpdate, JobInfo, MessagePayload,
    ProofPayload, ProofUpdate,
};

/// Request body for an agency callback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Callback<P> {
    pub job_id: String,
    pub connection_id: String,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Callback<P> {
    fn split(self, tenant_id: String) -> (JobInfo, P) {
        (
            JobInfo {
                job_id: self.job_id,
                tenant_id,
                connection_id: self.connection_id,
            },
            self.payload,
        )
    }
}

/// Message status reports are accepted in any shape and not interpreted.
pub type MessageStatus = serde_json::Map<String, serde_json::Value>;

fn respond(outcome: CallbackOutcome) -> Response {
    match outcome {
        CallbackOutcome::Processed { job } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "outcome": "processed",
                "jobId": job.id,
                "status": job.status,
                "result": job.result,
            })),
        )
            .into_response(),
        CallbackOutcome::Unchanged { job_id } => (
            StatusCode::ACCEPTED,
            Json(json!({ "outcome": "unchanged", "jobId": job_id })),
        )
            .into_response(),
        CallbackOutcome::Unsupported { protocol, action } => (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({ "error": format!("{protocol} {action} is not supported") })),
        )
            .into_response(),
        CallbackOutcome::Failed { error } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}

/// Handler for `POST /agency/{tenantId}/connection`.
pub async fn connection_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<ConnectionPayload>>,
) -> Response {
    let (info, payload) = body.split(tenant_id);
    respond(state.listener.add_connection(info, payload).await)
}

/// Handler for `POST /agency/{tenantId}/message`.
pub async fn message_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<MessagePayload>>,
) -> Response {
    let (info, payload) = body.split(tenant_id);
    respond(state.listener.add_message(info, payload).await)
}

/// Handler for `POST /agency/{tenantId}/message/update`.
pub async fn message_update_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<MessageStatus>>,
) -> Response {
    let (info, _) = body.split(tenant_id);
    respond(state.listener.update_message(info).await)
}

/// Handler for `POST /agency/{tenantId}/credential`.
pub async fn credential_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<CredentialPayload>>,
) -> Response {
    let (info, payload) = body.split(tenant_id);
    respond(state.listener.add_credential(info, payload).await)
}

/// Handler for `POST /agency/{tenantId}/credential/update`.
pub async fn credential_update_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<CredentialUpdate>>,
) -> Response {
    let (info, update) = body.split(tenant_id);
    respond(state.listener.update_credential(info, update).await)
}

/// Handler for `POST /agency/{tenantId}/proof`.
pub async fn proof_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<ProofPayload>>,
) -> Response {
    let (info, payload) = body.split(tenant_id);
    respond(state.listener.add_proof(info, payload).await)
}

/// Handler for `POST /agency/{tenantId}/proof/update`.
pub async fn proof_update_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<Callback<ProofUpdate>>,
) -> Response {
    let (info, update) = body.split(tenant_id);
    respond(state.listener.update_proof(info, update).await)
}
