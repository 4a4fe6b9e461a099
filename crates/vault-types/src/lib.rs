//! Shared types for the job vault.
//!
//! This crate holds the data model every other vault crate speaks: tracked
//! [`Job`]s, the protocol records they point at (connections, messages,
//! credentials, proofs), the append-only [`Event`] journal rows, and the
//! payloads the protocol agency delivers to the listener.
//!
//! It also hosts the lifecycle tracker ([`derive_status`]), the pure
//! function that turns credential/proof milestone timestamps into a job
//! status and result. It has no state and no I/O, so it lives next to the
//! types it maps between.
//!
//! No crate in the workspace depends on anything *except* `vault-types` for
//! cross-cutting type definitions.

mod event;
mod job;
mod lifecycle;
mod payload;
mod records;

pub use event::{Event, EventView, NewEvent};
pub use job::{Job, JobResult, JobStatus, NewJob, ProtocolType};
pub use lifecycle::{derive_status, initial_status};
pub use payload::{
    ConnectionPayload, CredentialPayload, CredentialUpdate, JobInfo, MessagePayload,
    ProofPayload, ProofUpdate,
};
pub use records::{
    Connection, Credential, CredentialAttribute, CredentialRole, Message, Milestones,
    NewConnection, NewCredential, NewMessage, NewProof, Proof, ProofAttribute, ProofRole,
};

/// Error returned when parsing an unknown enum label.
///
/// The first field names the enum, the second carries the rejected input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {0}: {1}")]
pub struct ParseEnumError(pub &'static str, pub String);
