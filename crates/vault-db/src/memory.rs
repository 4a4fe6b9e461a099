//! In-process [`Store`] for tests and embedding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;
use vault_types::{
    Connection, Credential, Event, Job, Message, Milestones, NewConnection, NewCredential,
    NewEvent, NewJob, NewMessage, NewProof, Proof,
};

use crate::error::StoreError;
use crate::store::Store;

type Key = (String, String);

fn key(tenant_id: &str, id: &str) -> Key {
    (tenant_id.to_string(), id.to_string())
}

#[derive(Default)]
struct Tables {
    jobs: HashMap<Key, Job>,
    connections: HashMap<Key, Connection>,
    messages: HashMap<Key, Message>,
    credentials: HashMap<Key, Credential>,
    proofs: HashMap<Key, Proof>,
    /// Insertion order is journal order.
    events: Vec<Event>,
}

/// A [`Store`] that keeps every row in memory behind one mutex.
///
/// Lock acquisitions never span an `.await`, so a synchronous mutex is
/// enough.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_event_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent [`Store::add_event`] fail with
    /// [`StoreError::Unavailable`] while `fail` is set.
    pub fn fail_event_writes(&self, fail: bool) {
        self.fail_event_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of journal rows across all tenants.
    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn add_job(&self, job: &NewJob) -> Result<Job, StoreError> {
        let mut tables = self.lock();
        let k = key(&job.tenant_id, &job.id);
        if tables.jobs.contains_key(&k) {
            return Err(StoreError::Duplicate {
                entity: "job",
                id: job.id.clone(),
            });
        }

        let now = Utc::now();
        let stored = Job {
            id: job.id.clone(),
            tenant_id: job.tenant_id.clone(),
            protocol_type: job.protocol_type,
            connection_id: job.connection_id.clone(),
            initiated_by_us: job.initiated_by_us,
            status: job.status,
            result: job.result,
            protocol_connection_id: job.protocol_connection_id.clone(),
            protocol_message_id: job.protocol_message_id.clone(),
            protocol_credential_id: job.protocol_credential_id.clone(),
            protocol_proof_id: job.protocol_proof_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(k, stored.clone());
        Ok(stored)
    }

    fn update_job(&self, job: &Job) -> Result<Job, StoreError> {
        let mut tables = self.lock();
        let slot = tables
            .jobs
            .get_mut(&key(&job.tenant_id, &job.id))
            .ok_or_else(|| StoreError::not_found("job", &job.id))?;

        let created_at = slot.created_at;
        *slot = job.clone();
        slot.created_at = created_at;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    fn get_job(&self, tenant_id: &str, id: &str) -> Result<Job, StoreError> {
        self.lock()
            .jobs
            .get(&key(tenant_id, id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("job", id))
    }

    fn list_jobs(&self, tenant_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .lock()
            .jobs
            .values()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    fn add_connection(&self, connection: &NewConnection) -> Result<Connection, StoreError> {
        let mut tables = self.lock();
        let k = key(&connection.tenant_id, &connection.id);
        if tables.connections.contains_key(&k) {
            return Err(StoreError::Duplicate {
                entity: "connection",
                id: connection.id.clone(),
            });
        }

        let stored = Connection {
            id: connection.id.clone(),
            tenant_id: connection.tenant_id.clone(),
            our_did: connection.our_did.clone(),
            their_did: connection.their_did.clone(),
            their_endpoint: connection.their_endpoint.clone(),
            their_label: connection.their_label.clone(),
            invited: connection.invited,
            approved: connection.approved,
            created_at: Utc::now(),
        };
        tables.connections.insert(k, stored.clone());
        Ok(stored)
    }

    fn get_connection(&self, tenant_id: &str, id: &str) -> Result<Connection, StoreError> {
        self.lock()
            .connections
            .get(&key(tenant_id, id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("connection", id))
    }

    fn add_message(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let stored = Message {
            id: Uuid::new_v4().to_string(),
            tenant_id: message.tenant_id.clone(),
            connection_id: message.connection_id.clone(),
            message: message.message.clone(),
            sent_by_us: message.sent_by_us,
            delivered: message.delivered,
            created_at: Utc::now(),
        };
        self.lock()
            .messages
            .insert(key(&stored.tenant_id, &stored.id), stored.clone());
        Ok(stored)
    }

    fn add_credential(&self, credential: &NewCredential) -> Result<Credential, StoreError> {
        let stored = Credential {
            id: Uuid::new_v4().to_string(),
            tenant_id: credential.tenant_id.clone(),
            connection_id: credential.connection_id.clone(),
            role: credential.role,
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            attributes: credential.attributes.clone(),
            initiated_by_us: credential.initiated_by_us,
            milestones: Milestones::default(),
            created_at: Utc::now(),
        };
        self.lock()
            .credentials
            .insert(key(&stored.tenant_id, &stored.id), stored.clone());
        Ok(stored)
    }

    fn update_credential(&self, credential: &Credential) -> Result<Credential, StoreError> {
        let mut tables = self.lock();
        let slot = tables
            .credentials
            .get_mut(&key(&credential.tenant_id, &credential.id))
            .ok_or_else(|| StoreError::not_found("credential", &credential.id))?;
        slot.milestones = credential.milestones;
        Ok(slot.clone())
    }

    fn get_credential(&self, tenant_id: &str, id: &str) -> Result<Credential, StoreError> {
        self.lock()
            .credentials
            .get(&key(tenant_id, id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("credential", id))
    }

    fn add_proof(&self, proof: &NewProof) -> Result<Proof, StoreError> {
        let stored = Proof {
            id: Uuid::new_v4().to_string(),
            tenant_id: proof.tenant_id.clone(),
            connection_id: proof.connection_id.clone(),
            role: proof.role,
            attributes: proof.attributes.clone(),
            result: false,
            initiated_by_us: proof.initiated_by_us,
            milestones: Milestones::default(),
            created_at: Utc::now(),
        };
        self.lock()
            .proofs
            .insert(key(&stored.tenant_id, &stored.id), stored.clone());
        Ok(stored)
    }

    fn update_proof(&self, proof: &Proof) -> Result<Proof, StoreError> {
        let mut tables = self.lock();
        let slot = tables
            .proofs
            .get_mut(&key(&proof.tenant_id, &proof.id))
            .ok_or_else(|| StoreError::not_found("proof", &proof.id))?;
        slot.milestones = proof.milestones;
        slot.result = proof.result;
        Ok(slot.clone())
    }

    fn get_proof(&self, tenant_id: &str, id: &str) -> Result<Proof, StoreError> {
        self.lock()
            .proofs
            .get(&key(tenant_id, id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("proof", id))
    }

    fn add_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        if self.fail_event_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("event writes disabled".to_string()));
        }

        let stored = Event {
            id: Uuid::new_v4().to_string(),
            tenant_id: event.tenant_id.clone(),
            description: event.description.clone(),
            connection_id: event.connection_id.clone(),
            job_id: event.job_id.clone(),
            read: false,
            created_at: Utc::now(),
        };
        self.lock().events.push(stored.clone());
        Ok(stored)
    }

    fn get_event(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError> {
        self.lock()
            .events
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("event", id))
    }

    fn list_events(&self, tenant_id: &str, limit: usize) -> Result<Vec<Event>, StoreError> {
        Ok(self
            .lock()
            .events
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_event_read(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError> {
        let mut tables = self.lock();
        let event = tables
            .events
            .iter_mut()
            .find(|e| e.tenant_id == tenant_id && e.id == id)
            .ok_or_else(|| StoreError::not_found("event", id))?;
        event.read = true;
        Ok(event.clone())
    }
}
