//! Callback payloads delivered by the protocol agency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{CredentialAttribute, CredentialRole, Milestones, ProofAttribute, ProofRole};

/// Identifies the job a callback is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub job_id: String,
    pub tenant_id: String,
    pub connection_id: String,
}

/// A pairwise connection was established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
    pub our_did: String,
    pub their_did: String,
    pub their_endpoint: String,
    pub their_label: String,
}

/// A basic message was sent or received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub text: String,
    pub sent_by_us: bool,
}

/// A credential exchange started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    pub role: CredentialRole,
    pub schema_id: String,
    pub cred_def_id: String,
    #[serde(default)]
    pub attributes: Vec<CredentialAttribute>,
    pub initiated_by_us: bool,
}

/// Progress report for a credential exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUpdate {
    pub approved_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<CredentialUpdate> for Milestones {
    fn from(update: CredentialUpdate) -> Self {
        Self {
            approved: update.approved_at,
            completed: update.issued_at,
            failed: update.failed_at,
        }
    }
}

/// A proof exchange started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub role: ProofRole,
    #[serde(default)]
    pub attributes: Vec<ProofAttribute>,
    pub initiated_by_us: bool,
}

/// Progress report for a proof exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofUpdate {
    pub approved_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<ProofUpdate> for Milestones {
    fn from(update: ProofUpdate) -> Self {
        Self {
            approved: update.approved_at,
            completed: update.verified_at,
            failed: update.failed_at,
        }
    }
}
