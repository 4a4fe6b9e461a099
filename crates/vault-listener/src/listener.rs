use std::future::Future;

use chrono::Utc;
use vault_events::Updater;
use vault_types::{
    initial_status, ConnectionPayload, CredentialPayload, CredentialRole, CredentialUpdate, Job,
    JobInfo, JobResult, JobStatus, MessagePayload, Milestones, NewConnection, NewCredential,
    NewJob, NewMessage, NewProof, ProofPayload, ProofRole, ProofUpdate, ProtocolType,
};

use crate::error::ListenerError;
use crate::outcome::CallbackOutcome;

/// Turns protocol-agency callbacks into stored records, job transitions and
/// tenant events.
#[derive(Clone)]
pub struct Listener {
    updater: Updater,
}

impl Listener {
    pub fn new(updater: Updater) -> Self {
        Self { updater }
    }

    pub fn updater(&self) -> &Updater {
        &self.updater
    }

    /// A pairwise connection was established for the job in `info`.
    pub async fn add_connection(&self, info: JobInfo, payload: ConnectionPayload) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::Connection,
            "add",
            self.apply_connection(info, payload),
        )
        .await
    }

    /// A basic message was sent or received over `info.connection_id`.
    pub async fn add_message(&self, info: JobInfo, payload: MessagePayload) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::BasicMessage,
            "add",
            self.apply_message(info, payload),
        )
        .await
    }

    /// Message status updates carry nothing this bridge tracks.
    pub async fn update_message(&self, info: JobInfo) -> CallbackOutcome {
        let outcome = CallbackOutcome::Unsupported {
            protocol: ProtocolType::BasicMessage,
            action: "update",
        };
        outcome.log(&info.tenant_id, ProtocolType::BasicMessage, "update");
        outcome
    }

    /// A credential exchange started.
    pub async fn add_credential(&self, info: JobInfo, payload: CredentialPayload) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::Credential,
            "add",
            self.apply_credential(info, payload),
        )
        .await
    }

    /// A credential exchange made progress.
    pub async fn update_credential(&self, info: JobInfo, update: CredentialUpdate) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::Credential,
            "update",
            self.apply_credential_update(info, update),
        )
        .await
    }

    /// A proof exchange started.
    pub async fn add_proof(&self, info: JobInfo, payload: ProofPayload) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::Proof,
            "add",
            self.apply_proof(info, payload),
        )
        .await
    }

    /// A proof exchange made progress.
    pub async fn update_proof(&self, info: JobInfo, update: ProofUpdate) -> CallbackOutcome {
        let tenant_id = info.tenant_id.clone();
        self.boundary(
            &tenant_id,
            ProtocolType::Proof,
            "update",
            self.apply_proof_update(info, update),
        )
        .await
    }

    /// Failure boundary shared by every entrypoint.
    async fn boundary<F>(
        &self,
        tenant_id: &str,
        protocol: ProtocolType,
        action: &'static str,
        work: F,
    ) -> CallbackOutcome
    where
        F: Future<Output = Result<CallbackOutcome, ListenerError>>,
    {
        let outcome = work
            .await
            .unwrap_or_else(|error| CallbackOutcome::Failed { error });
        outcome.log(tenant_id, protocol, action);
        outcome
    }

    async fn apply_connection(
        &self,
        info: JobInfo,
        payload: ConnectionPayload,
    ) -> Result<CallbackOutcome, ListenerError> {
        let mut job = self.fetch_job(&info).await?;
        if job.protocol_type != ProtocolType::Connection {
            return Err(ListenerError::Invalid(format!(
                "job {} tracks {}, not a connection",
                job.id, job.protocol_type
            )));
        }
        if job.status.is_terminal() {
            tracing::debug!(
                tenant_id = %job.tenant_id,
                job_id = %job.id,
                "connection already established for job"
            );
            return Ok(CallbackOutcome::Unchanged { job_id: job.id });
        }

        let new_connection = NewConnection {
            id: info.connection_id.clone(),
            tenant_id: info.tenant_id.clone(),
            our_did: payload.our_did,
            their_did: payload.their_did,
            their_endpoint: payload.their_endpoint,
            their_label: payload.their_label,
            invited: job.initiated_by_us,
            approved: Utc::now(),
        };
        let connection = self
            .updater
            .with_store(move |store| store.add_connection(&new_connection))
            .await?;

        job.connection_id = Some(connection.id.clone());
        job.protocol_connection_id = Some(connection.id.clone());
        if !job.advance(JobStatus::Completed, JobResult::Success) {
            return Ok(CallbackOutcome::Unchanged { job_id: job.id });
        }

        let description = format!("Established connection to {}", connection.their_label);
        let job = self.updater.update_job(&job, &description).await?;
        Ok(CallbackOutcome::Processed { job })
    }

    async fn apply_message(
        &self,
        info: JobInfo,
        payload: MessagePayload,
    ) -> Result<CallbackOutcome, ListenerError> {
        let description = if payload.sent_by_us {
            format!("Sent message {}", payload.text)
        } else {
            format!("Received message {}", payload.text)
        };

        let new_message = NewMessage {
            tenant_id: info.tenant_id.clone(),
            connection_id: info.connection_id.clone(),
            message: payload.text,
            sent_by_us: payload.sent_by_us,
            delivered: None,
        };
        let message = self
            .updater
            .with_store(move |store| store.add_message(&new_message))
            .await?;

        let mut new_job = NewJob::new(
            info.job_id,
            info.tenant_id,
            ProtocolType::BasicMessage,
            payload.sent_by_us,
            JobStatus::Completed,
        )
        .with_connection(Some(info.connection_id));
        new_job.result = JobResult::Success;
        new_job.protocol_message_id = Some(message.id);

        let job = self.updater.add_job(new_job, &description).await?;
        Ok(CallbackOutcome::Processed { job })
    }

    async fn apply_credential(
        &self,
        info: JobInfo,
        payload: CredentialPayload,
    ) -> Result<CallbackOutcome, ListenerError> {
        let description = match payload.role {
            CredentialRole::Holder => format!("Offer for credential {}", payload.schema_id),
            CredentialRole::Issuer => format!("Issuing credential {}", payload.schema_id),
        };
        let initiated_by_us = payload.initiated_by_us;

        let new_credential = NewCredential {
            tenant_id: info.tenant_id.clone(),
            connection_id: info.connection_id.clone(),
            role: payload.role,
            schema_id: payload.schema_id,
            cred_def_id: payload.cred_def_id,
            attributes: payload.attributes,
            initiated_by_us,
        };
        let credential = self
            .updater
            .with_store(move |store| store.add_credential(&new_credential))
            .await?;

        let mut new_job = NewJob::new(
            info.job_id,
            info.tenant_id,
            ProtocolType::Credential,
            initiated_by_us,
            initial_status(initiated_by_us),
        )
        .with_connection(Some(info.connection_id));
        new_job.protocol_credential_id = Some(credential.id);

        let job = self.updater.add_job(new_job, &description).await?;
        Ok(CallbackOutcome::Processed { job })
    }

    async fn apply_credential_update(
        &self,
        info: JobInfo,
        update: CredentialUpdate,
    ) -> Result<CallbackOutcome, ListenerError> {
        let job = self.fetch_job(&info).await?;
        let credential_id = job.protocol_credential_id.clone().ok_or_else(|| {
            ListenerError::Invalid(format!("job {} has no credential reference", job.id))
        })?;

        let tenant_id = info.tenant_id.clone();
        let mut credential = self
            .updater
            .with_store(move |store| store.get_credential(&tenant_id, &credential_id))
            .await?;

        if credential.milestones.merge(&Milestones::from(update)) {
            let changed = credential.clone();
            credential = self
                .updater
                .with_store(move |store| store.update_credential(&changed))
                .await?;
        }

        let (status, result) = credential.milestones.status();
        let description = match (status, result) {
            (JobStatus::Completed, JobResult::Success) => {
                format!("Credential {} issued", credential.schema_id)
            }
            (JobStatus::Completed, _) => {
                format!("Credential {} declined", credential.schema_id)
            }
            _ => format!("Credential {} approved", credential.schema_id),
        };

        self.advance_job(job, status, result, &description).await
    }

    async fn apply_proof(
        &self,
        info: JobInfo,
        payload: ProofPayload,
    ) -> Result<CallbackOutcome, ListenerError> {
        let description = match payload.role {
            ProofRole::Prover => "Request for proof",
            ProofRole::Verifier => "Requesting proof",
        };
        let initiated_by_us = payload.initiated_by_us;

        let new_proof = NewProof {
            tenant_id: info.tenant_id.clone(),
            connection_id: info.connection_id.clone(),
            role: payload.role,
            attributes: payload.attributes,
            initiated_by_us,
        };
        let proof = self
            .updater
            .with_store(move |store| store.add_proof(&new_proof))
            .await?;

        let mut new_job = NewJob::new(
            info.job_id,
            info.tenant_id,
            ProtocolType::Proof,
            initiated_by_us,
            initial_status(initiated_by_us),
        )
        .with_connection(Some(info.connection_id));
        new_job.protocol_proof_id = Some(proof.id);

        let job = self.updater.add_job(new_job, description).await?;
        Ok(CallbackOutcome::Processed { job })
    }

    async fn apply_proof_update(
        &self,
        info: JobInfo,
        update: ProofUpdate,
    ) -> Result<CallbackOutcome, ListenerError> {
        let job = self.fetch_job(&info).await?;
        let proof_id = job.protocol_proof_id.clone().ok_or_else(|| {
            ListenerError::Invalid(format!("job {} has no proof reference", job.id))
        })?;

        let tenant_id = info.tenant_id.clone();
        let mut proof = self
            .updater
            .with_store(move |store| store.get_proof(&tenant_id, &proof_id))
            .await?;

        let merged = proof.milestones.merge(&Milestones::from(update));
        let (status, result) = proof.milestones.status();
        let verified = result == JobResult::Success;

        if merged || proof.result != verified {
            proof.result = verified;
            let changed = proof.clone();
            proof = self
                .updater
                .with_store(move |store| store.update_proof(&changed))
                .await?;
        }

        let description = match (status, result) {
            (JobStatus::Completed, JobResult::Success) => "Proof verified",
            (JobStatus::Completed, _) => "Proof failed",
            _ => "Proof approved",
        };

        self.advance_job(job, status, result, description).await
    }

    /// Records `description` against `job`, moving it to the derived state
    /// when that is a forward step. Completed jobs are left alone and get
    /// no event.
    async fn advance_job(
        &self,
        mut job: Job,
        status: JobStatus,
        result: JobResult,
        description: &str,
    ) -> Result<CallbackOutcome, ListenerError> {
        if job.status.is_terminal() {
            tracing::debug!(
                tenant_id = %job.tenant_id,
                job_id = %job.id,
                derived = %status,
                "job already completed; milestones merged without a new event"
            );
            return Ok(CallbackOutcome::Unchanged { job_id: job.id });
        }

        if !job.advance(status, result) {
            tracing::debug!(
                tenant_id = %job.tenant_id,
                job_id = %job.id,
                stored = %job.status,
                derived = %status,
                "job keeps its status"
            );
        }

        let job = self.updater.update_job(&job, description).await?;
        Ok(CallbackOutcome::Processed { job })
    }

    async fn fetch_job(&self, info: &JobInfo) -> Result<Job, ListenerError> {
        let tenant_id = info.tenant_id.clone();
        let job_id = info.job_id.clone();
        Ok(self
            .updater
            .with_store(move |store| store.get_job(&tenant_id, &job_id))
            .await?)
    }
}
