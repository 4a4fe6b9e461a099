//! SQLite-backed [`Store`].

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, types::Type, OptionalExtension, Row};
use uuid::Uuid;
use vault_types::{
    Connection, Credential, CredentialAttribute, Event, Job, Message, Milestones, NewConnection,
    NewCredential, NewEvent, NewJob, NewMessage, NewProof, Proof, ProofAttribute,
};

use crate::error::StoreError;
use crate::schema;
use crate::store::Store;

const JOB_COLUMNS: &str = "tenant_id, id, protocol_type, connection_id, initiated_by_us, status, \
     result, protocol_connection_id, protocol_message_id, protocol_credential_id, \
     protocol_proof_id, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "tenant_id, id, our_did, their_did, their_endpoint, their_label, \
     invited, approved, created_at";

const CREDENTIAL_COLUMNS: &str = "id, tenant_id, connection_id, role, schema_id, cred_def_id, \
     attributes_json, initiated_by_us, approved, issued, failed, created_at";

const PROOF_COLUMNS: &str = "id, tenant_id, connection_id, role, attributes_json, result, \
     initiated_by_us, approved, verified, failed, created_at";

const EVENT_COLUMNS: &str = "id, tenant_id, description, connection_id, job_id, read, created_at";

/// Connection tunables for [`SqliteStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteSettings {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_connections: 8,
        }
    }
}

/// Stores vault rows in SQLite through an r2d2 pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Opens the database file at `path`, creating it if needed, and
    /// upgrades its schema.
    pub fn open(path: impl AsRef<Path>, settings: SqliteSettings) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(move |conn| tune(conn, settings.busy_timeout));
        let pool = Pool::builder().max_size(settings.max_connections.max(1));
        let store = Self::build(pool, manager)?;
        tracing::info!(
            path = %path.as_ref().display(),
            max_connections = store.pool.max_size(),
            "opened sqlite store"
        );
        Ok(store)
    }

    /// A private database that lives as long as the store. Held on one
    /// connection that is never recycled, since every in-memory connection
    /// is its own database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager =
            SqliteConnectionManager::memory().with_init(|conn| tune(conn, Duration::ZERO));
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::build(pool, manager)
    }

    fn build(
        pool: r2d2::Builder<SqliteConnectionManager>,
        manager: SqliteConnectionManager,
    ) -> Result<Self, StoreError> {
        let pool = pool.build(manager)?;
        let applied = schema::upgrade(&*pool.get()?)?;
        if applied > 0 {
            tracing::debug!(applied, "schema steps applied");
        }
        Ok(Self { pool })
    }

    pub(crate) fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

/// Per-connection setup. In-memory databases report `memory` for the
/// journal mode and ignore the WAL request.
fn tune(conn: &mut rusqlite::Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
}

impl Store for SqliteStore {
    fn add_job(&self, job: &NewJob) -> Result<Job, StoreError> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO jobs ({JOB_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)"),
            params![
                job.tenant_id,
                job.id,
                job.protocol_type.as_str(),
                job.connection_id,
                job.initiated_by_us,
                job.status.as_str(),
                job.result.as_str(),
                job.protocol_connection_id,
                job.protocol_message_id,
                job.protocol_credential_id,
                job.protocol_proof_id,
                now,
            ],
        )
        .map_err(|e| StoreError::on_insert("job", &job.id, e))?;

        Ok(Job {
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
        })
    }

    fn update_job(&self, job: &Job) -> Result<Job, StoreError> {
        let now = Utc::now();
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE jobs SET
                connection_id = ?3, status = ?4, result = ?5,
                protocol_connection_id = ?6, protocol_message_id = ?7,
                protocol_credential_id = ?8, protocol_proof_id = ?9,
                updated_at = ?10
             WHERE tenant_id = ?1 AND id = ?2",
            params![
                job.tenant_id,
                job.id,
                job.connection_id,
                job.status.as_str(),
                job.result.as_str(),
                job.protocol_connection_id,
                job.protocol_message_id,
                job.protocol_credential_id,
                job.protocol_proof_id,
                now,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("job", &job.id));
        }

        let mut updated = job.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    fn get_job(&self, tenant_id: &str, id: &str) -> Result<Job, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                map_job,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("job", id))
    }

    fn list_jobs(&self, tenant_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE tenant_id = ?1
             ORDER BY updated_at DESC, id ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![tenant_id, limit_param(limit)], map_job)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn add_connection(&self, connection: &NewConnection) -> Result<Connection, StoreError> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO connections ({CONNECTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                connection.tenant_id,
                connection.id,
                connection.our_did,
                connection.their_did,
                connection.their_endpoint,
                connection.their_label,
                connection.invited,
                connection.approved,
                now,
            ],
        )
        .map_err(|e| StoreError::on_insert("connection", &connection.id, e))?;

        Ok(Connection {
            id: connection.id.clone(),
            tenant_id: connection.tenant_id.clone(),
            our_did: connection.our_did.clone(),
            their_did: connection.their_did.clone(),
            their_endpoint: connection.their_endpoint.clone(),
            their_label: connection.their_label.clone(),
            invited: connection.invited,
            approved: connection.approved,
            created_at: now,
        })
    }

    fn get_connection(&self, tenant_id: &str, id: &str) -> Result<Connection, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                |row| {
                    Ok(Connection {
                        tenant_id: row.get(0)?,
                        id: row.get(1)?,
                        our_did: row.get(2)?,
                        their_did: row.get(3)?,
                        their_endpoint: row.get(4)?,
                        their_label: row.get(5)?,
                        invited: row.get(6)?,
                        approved: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("connection", id))
    }

    fn add_message(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (id, tenant_id, connection_id, message, sent_by_us, delivered, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                message.tenant_id,
                message.connection_id,
                message.message,
                message.sent_by_us,
                message.delivered,
                now,
            ],
        )?;

        Ok(Message {
            id,
            tenant_id: message.tenant_id.clone(),
            connection_id: message.connection_id.clone(),
            message: message.message.clone(),
            sent_by_us: message.sent_by_us,
            delivered: message.delivered,
            created_at: now,
        })
    }

    fn add_credential(&self, credential: &NewCredential) -> Result<Credential, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let attributes_json = serde_json::to_string(&credential.attributes)?;
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO credentials ({CREDENTIAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL, NULL, ?9)"),
            params![
                id,
                credential.tenant_id,
                credential.connection_id,
                credential.role.as_str(),
                credential.schema_id,
                credential.cred_def_id,
                attributes_json,
                credential.initiated_by_us,
                now,
            ],
        )?;

        Ok(Credential {
            id,
            tenant_id: credential.tenant_id.clone(),
            connection_id: credential.connection_id.clone(),
            role: credential.role,
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            attributes: credential.attributes.clone(),
            initiated_by_us: credential.initiated_by_us,
            milestones: Milestones::default(),
            created_at: now,
        })
    }

    fn update_credential(&self, credential: &Credential) -> Result<Credential, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE credentials SET approved = ?3, issued = ?4, failed = ?5
             WHERE tenant_id = ?1 AND id = ?2",
            params![
                credential.tenant_id,
                credential.id,
                credential.milestones.approved,
                credential.milestones.completed,
                credential.milestones.failed,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("credential", &credential.id));
        }
        Ok(credential.clone())
    }

    fn get_credential(&self, tenant_id: &str, id: &str) -> Result<Credential, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                |row| {
                    Ok(Credential {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        connection_id: row.get(2)?,
                        role: parse_column(row, 3)?,
                        schema_id: row.get(4)?,
                        cred_def_id: row.get(5)?,
                        attributes: json_column::<Vec<CredentialAttribute>>(row, 6)?,
                        initiated_by_us: row.get(7)?,
                        milestones: Milestones {
                            approved: row.get(8)?,
                            completed: row.get(9)?,
                            failed: row.get(10)?,
                        },
                        created_at: row.get(11)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("credential", id))
    }

    fn add_proof(&self, proof: &NewProof) -> Result<Proof, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let attributes_json = serde_json::to_string(&proof.attributes)?;
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO proofs ({PROOF_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, NULL, NULL, NULL, ?7)"),
            params![
                id,
                proof.tenant_id,
                proof.connection_id,
                proof.role.as_str(),
                attributes_json,
                proof.initiated_by_us,
                now,
            ],
        )?;

        Ok(Proof {
            id,
            tenant_id: proof.tenant_id.clone(),
            connection_id: proof.connection_id.clone(),
            role: proof.role,
            attributes: proof.attributes.clone(),
            result: false,
            initiated_by_us: proof.initiated_by_us,
            milestones: Milestones::default(),
            created_at: now,
        })
    }

    fn update_proof(&self, proof: &Proof) -> Result<Proof, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE proofs SET result = ?3, approved = ?4, verified = ?5, failed = ?6
             WHERE tenant_id = ?1 AND id = ?2",
            params![
                proof.tenant_id,
                proof.id,
                proof.result,
                proof.milestones.approved,
                proof.milestones.completed,
                proof.milestones.failed,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("proof", &proof.id));
        }
        Ok(proof.clone())
    }

    fn get_proof(&self, tenant_id: &str, id: &str) -> Result<Proof, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {PROOF_COLUMNS} FROM proofs WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                |row| {
                    Ok(Proof {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        connection_id: row.get(2)?,
                        role: parse_column(row, 3)?,
                        attributes: json_column::<Vec<ProofAttribute>>(row, 4)?,
                        result: row.get(5)?,
                        initiated_by_us: row.get(6)?,
                        milestones: Milestones {
                            approved: row.get(7)?,
                            completed: row.get(8)?,
                            failed: row.get(9)?,
                        },
                        created_at: row.get(10)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("proof", id))
    }

    fn add_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)"),
            params![
                id,
                event.tenant_id,
                event.description,
                event.connection_id,
                event.job_id,
                now,
            ],
        )?;

        Ok(Event {
            id,
            tenant_id: event.tenant_id.clone(),
            description: event.description.clone(),
            connection_id: event.connection_id.clone(),
            job_id: event.job_id.clone(),
            read: false,
            created_at: now,
        })
    }

    fn get_event(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                map_event,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("event", id))
    }

    fn list_events(&self, tenant_id: &str, limit: usize) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 ORDER BY seq DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![tenant_id, limit_param(limit)], map_event)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn mark_event_read(&self, tenant_id: &str, id: &str) -> Result<Event, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE events SET read = 1 WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("event", id));
        }
        self.get_event(tenant_id, id)
    }
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        tenant_id: row.get(0)?,
        id: row.get(1)?,
        protocol_type: parse_column(row, 2)?,
        connection_id: row.get(3)?,
        initiated_by_us: row.get(4)?,
        status: parse_column(row, 5)?,
        result: parse_column(row, 6)?,
        protocol_connection_id: row.get(7)?,
        protocol_message_id: row.get(8)?,
        protocol_credential_id: row.get(9)?,
        protocol_proof_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        description: row.get(2)?,
        connection_id: row.get(3)?,
        job_id: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Reads a text column holding an enum label.
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a text column holding JSON.
fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
