//! Job and connection endpoints for tenants.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vault_types::{Connection, Job, JobStatus, NewJob, ProtocolType};

/// Request body for `POST /api/tenants/{tenantId}/invitations`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRequest {
    /// Job id to track the invitation under. Generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Handler for `POST /api/tenants/{tenantId}/invitations`.
///
/// Records a connection job we initiated. It waits on the other party until
/// the agency reports the connection.
pub async fn create_invitation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let request: InvitationRequest = if body.is_empty() {
        InvitationRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let job_id = match request.job_id {
        Some(id) if id.trim().is_empty() => {
            return Err(ApiError::BadRequest("jobId must not be blank".to_string()))
        }
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let new_job = NewJob::new(
        job_id,
        tenant_id,
        ProtocolType::Connection,
        true,
        JobStatus::Waiting,
    );
    let job = state.updater.add_job(new_job, "Created invitation").await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Handler for `GET /api/tenants/{tenantId}/jobs/{jobId}`.
pub async fn get_job_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((tenant_id, job_id)): Path<(String, String)>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .updater
        .with_store(move |store| store.get_job(&tenant_id, &job_id))
        .await?;
    Ok(Json(job))
}

/// Query parameters for `GET /api/tenants/{tenantId}/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    /// Maximum number of jobs to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<Job>,
    pub count: usize,
}

/// Handler for `GET /api/tenants/{tenantId}/jobs`. Most recently updated
/// first.
pub async fn list_jobs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(params): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000) as usize;

    let jobs = state
        .updater
        .with_store(move |store| store.list_jobs(&tenant_id, limit))
        .await?;

    let count = jobs.len();
    Ok(Json(JobsResponse { jobs, count }))
}

/// Handler for `GET /api/tenants/{tenantId}/connections/{connectionId}`.
pub async fn get_connection_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((tenant_id, connection_id)): Path<(String, String)>,
) -> Result<Json<Connection>, ApiError> {
    let connection = state
        .updater
        .with_store(move |store| store.get_connection(&tenant_id, &connection_id))
        .await?;
    Ok(Json(connection))
}
