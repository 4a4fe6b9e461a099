//! The persistence interface the vault core talks to.

use vault_types::{
    Connection, Credential, Event, Job, Message, NewConnection, NewCredential, NewEvent, NewJob,
    NewMessage, NewProof, Proof,
};

use crate::error::StoreError;

/// Tenant-scoped persistence for jobs, protocol records and events.
///
/// Every write returns the fully materialized row, including generated ids
/// and timestamps. Implementations are synchronous; async callers run them
/// through `tokio::task::spawn_blocking`.
pub trait Store: Send + Sync {
    /// Inserts a job. The id comes from the caller.
    fn add_job(&self, job: &NewJob) -> Result<Job, StoreError>;
    /// Overwrites the mutable columns of an existing job.
    fn update_job(&self, job: &Job) -> Result<Job, StoreError>;
    fn get_job(&self, tenant_id: &str, id: &str) -> Result<Job, StoreError>;
    /// Most recently updated jobs first.
    fn list_jobs(&self, tenant_id: &str, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Inserts a connection. The id comes from the caller.
    fn add_connection(&self, connection: &NewConnection) -> Result<Connection, StoreError>;
    fn get_connection(&self, tenant_id: &str, id: &str) -> Result<Connection, StoreError>;

    fn add_message(&self, message: &NewMessage) -> Result<Message, StoreError>;

    fn add_credential(&self, credential: &NewCredential) -> Result<Credential, StoreError>;
    /// Persists the credential's milestones as given.
    fn update_credential(&self, credential: &Credential) -> Result<Credential, StoreError>;
    fn get_credential(&self, tenant_id: &str, id: &str) -> Result<Credential, StoreError>;

    fn add_proof(&self, proof: &NewProof) -> Result<Proof, StoreError>;
    /// Persists the proof's milestones and result as given.
    fn update_proof(&self, proof: &Proof) -> Result<Proof, StoreError>;
    fn get_proof(&self, tenant_id: &str, id: &str) -> Result<Proof, StoreError>;

    /// Appends an event to the journal.
    fn add_event(&self, event: &NewEvent) -> Result<Event, StoreError>;
    fn get_event(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError>;
    /// Newest events first.
    fn list_events(&self, tenant_id: &str, limit: usize) -> Result<Vec<Event>, StoreError>;
    /// Sets the `read` flag; the only mutation an event ever sees.
    fn mark_event_read(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError>;
}
