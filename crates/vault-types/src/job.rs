//! Tracked jobs and their status vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// The protocol family a job tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolType {
    /// Pairwise connection setup.
    Connection,
    /// Fire-and-forget text message.
    BasicMessage,
    /// Credential issuance.
    Credential,
    /// Proof presentation.
    Proof,
    /// Placeholder for jobs that do not track a protocol run.
    None,
}

impl ProtocolType {
    /// Returns the canonical string label for this protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "CONNECTION",
            Self::BasicMessage => "BASIC_MESSAGE",
            Self::Credential => "CREDENTIAL",
            Self::Proof => "PROOF",
            Self::None => "NONE",
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProtocolType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTION" => Ok(Self::Connection),
            "BASIC_MESSAGE" => Ok(Self::BasicMessage),
            "CREDENTIAL" => Ok(Self::Credential),
            "PROOF" => Ok(Self::Proof),
            "NONE" => Ok(Self::None),
            _ => Err(ParseEnumError("protocol type", s.to_string())),
        }
    }
}

/// Where a job is in its lifecycle. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// The other party has to act before anything happens.
    Pending,
    /// We are waiting on the protocol run to progress.
    Waiting,
    /// The protocol run finished; see [`JobResult`].
    Completed,
}

impl JobStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Waiting => "WAITING",
            Self::Completed => "COMPLETED",
        }
    }

    /// Whether no further transition is allowed out of this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "WAITING" => Ok(Self::Waiting),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(ParseEnumError("job status", s.to_string())),
        }
    }
}

/// Outcome of a job. Only meaningful once the job is [`JobStatus::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobResult {
    /// Not decided yet.
    None,
    /// The protocol run succeeded.
    Success,
    /// The protocol run failed or was declined.
    Failure,
}

impl JobResult {
    /// Returns the canonical string label for this result.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for JobResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            _ => Err(ParseEnumError("job result", s.to_string())),
        }
    }
}

/// A stored job row.
///
/// `(id, tenant_id)` is the key; job ids are chosen by the protocol agency
/// and are only unique within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub tenant_id: String,
    pub protocol_type: ProtocolType,
    pub connection_id: Option<String>,
    pub initiated_by_us: bool,
    pub status: JobStatus,
    pub result: JobResult,
    pub protocol_connection_id: Option<String>,
    pub protocol_message_id: Option<String>,
    pub protocol_credential_id: Option<String>,
    pub protocol_proof_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Moves the job to `status`/`result` if that is a forward transition.
    ///
    /// Returns `false` and leaves the job untouched when the job is already
    /// completed or when `status` would move it backwards. `result` is only
    /// recorded together with the move into [`JobStatus::Completed`].
    pub fn advance(&mut self, status: JobStatus, result: JobResult) -> bool {
        if self.status.is_terminal() || status <= self.status {
            return false;
        }
        self.status = status;
        self.result = if status.is_terminal() {
            result
        } else {
            JobResult::None
        };
        true
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub id: String,
    pub tenant_id: String,
    pub protocol_type: ProtocolType,
    pub connection_id: Option<String>,
    pub initiated_by_us: bool,
    pub status: JobStatus,
    pub result: JobResult,
    pub protocol_connection_id: Option<String>,
    pub protocol_message_id: Option<String>,
    pub protocol_credential_id: Option<String>,
    pub protocol_proof_id: Option<String>,
}

impl NewJob {
    /// A job with no protocol back-reference, in the given state.
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        protocol_type: ProtocolType,
        initiated_by_us: bool,
        status: JobStatus,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            protocol_type,
            connection_id: None,
            initiated_by_us,
            status,
            result: JobResult::None,
            protocol_connection_id: None,
            protocol_message_id: None,
            protocol_credential_id: None,
            protocol_proof_id: None,
        }
    }

    /// Sets the pairwise connection the job runs over.
    pub fn with_connection(mut self, connection_id: Option<String>) -> Self {
        self.connection_id = connection_id;
        self
    }
}
