//! Journal rows and their live projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::Job;

/// A single row from the `events` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub tenant_id: String,
    /// Human-readable summary of what happened.
    pub description: String,
    pub connection_id: Option<String>,
    pub job_id: Option<String>,
    /// Set by the tenant through an explicit action; `false` on creation.
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub tenant_id: String,
    pub description: String,
    pub connection_id: Option<String>,
    pub job_id: Option<String>,
}

impl NewEvent {
    /// An event for `tenant_id`, optionally tied to a job and its connection.
    pub fn new(tenant_id: impl Into<String>, job: Option<&Job>, description: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            description: description.into(),
            connection_id: job.and_then(|j| j.connection_id.clone()),
            job_id: job.map(|j| j.id.clone()),
        }
    }
}

/// What a live subscriber receives for each event.
///
/// The tenant id is implied by the subscription and left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub description: String,
    pub connection_id: Option<String>,
    pub job_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            description: event.description.clone(),
            connection_id: event.connection_id.clone(),
            job_id: event.job_id.clone(),
            read: event.read,
            created_at: event.created_at,
        }
    }
}
