//! Protocol records a job can point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobResult, JobStatus};
use crate::lifecycle::derive_status;
use crate::ParseEnumError;

/// Milestone timestamps reported by the protocol agency for a credential or
/// proof run.
///
/// Each field is sticky: once set it is never overwritten. Use
/// [`Milestones::merge`] to apply a progress report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestones {
    pub approved: Option<DateTime<Utc>>,
    /// Issued for credentials, verified for proofs.
    pub completed: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
}

impl Milestones {
    /// Fills every still-empty field from `update`.
    ///
    /// Fields that already hold a timestamp keep it. Returns `true` if any
    /// field changed.
    pub fn merge(&mut self, update: &Milestones) -> bool {
        let before = *self;
        self.approved = self.approved.or(update.approved);
        self.completed = self.completed.or(update.completed);
        self.failed = self.failed.or(update.failed);
        *self != before
    }

    /// Status and result these milestones map to.
    pub fn status(&self) -> (JobStatus, JobResult) {
        derive_status(self.approved, self.completed, self.failed)
    }
}

/// Our side of a credential exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialRole {
    Issuer,
    Holder,
}

impl CredentialRole {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issuer => "ISSUER",
            Self::Holder => "HOLDER",
        }
    }
}

impl std::str::FromStr for CredentialRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ISSUER" => Ok(Self::Issuer),
            "HOLDER" => Ok(Self::Holder),
            _ => Err(ParseEnumError("credential role", s.to_string())),
        }
    }
}

/// Our side of a proof exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofRole {
    Verifier,
    Prover,
}

impl ProofRole {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verifier => "VERIFIER",
            Self::Prover => "PROVER",
        }
    }
}

impl std::str::FromStr for ProofRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFIER" => Ok(Self::Verifier),
            "PROVER" => Ok(Self::Prover),
            _ => Err(ParseEnumError("proof role", s.to_string())),
        }
    }
}

/// A pairwise connection with another agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub tenant_id: String,
    pub our_did: String,
    pub their_did: String,
    pub their_endpoint: String,
    pub their_label: String,
    /// We created the invitation this connection came from.
    pub invited: bool,
    pub approved: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for storing a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnection {
    pub id: String,
    pub tenant_id: String,
    pub our_did: String,
    pub their_did: String,
    pub their_endpoint: String,
    pub their_label: String,
    pub invited: bool,
    pub approved: DateTime<Utc>,
}

/// A basic text message sent over a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub message: String,
    pub sent_by_us: bool,
    pub delivered: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for storing a message. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub tenant_id: String,
    pub connection_id: String,
    pub message: String,
    pub sent_by_us: bool,
    pub delivered: Option<bool>,
}

/// One attribute of an offered or issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialAttribute {
    pub name: String,
    pub value: String,
}

/// A credential exchange record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub role: CredentialRole,
    pub schema_id: String,
    pub cred_def_id: String,
    pub attributes: Vec<CredentialAttribute>,
    pub initiated_by_us: bool,
    pub milestones: Milestones,
    pub created_at: DateTime<Utc>,
}

/// Parameters for storing a credential. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCredential {
    pub tenant_id: String,
    pub connection_id: String,
    pub role: CredentialRole,
    pub schema_id: String,
    pub cred_def_id: String,
    pub attributes: Vec<CredentialAttribute>,
    pub initiated_by_us: bool,
}

/// One requested or presented proof attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofAttribute {
    pub name: String,
    pub value: Option<String>,
    pub cred_def_id: Option<String>,
}

/// A proof presentation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub role: ProofRole,
    pub attributes: Vec<ProofAttribute>,
    /// Verification outcome as reported by the agency.
    pub result: bool,
    pub initiated_by_us: bool,
    pub milestones: Milestones,
    pub created_at: DateTime<Utc>,
}

/// Parameters for storing a proof. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProof {
    pub tenant_id: String,
    pub connection_id: String,
    pub role: ProofRole,
    pub attributes: Vec<ProofAttribute>,
    pub initiated_by_us: bool,
}
