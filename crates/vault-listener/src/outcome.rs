//! What became of a single agency callback.

use vault_types::{Job, ProtocolType};

use crate::error::ListenerError;

/// Result of one bridge entrypoint. Entrypoints never return `Err`; a
/// failure is an outcome like any other.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// An event was recorded against the job, which moved if it could.
    Processed { job: Job },
    /// The job was already completed. Milestones may have been merged, but
    /// no event was recorded.
    Unchanged { job_id: String },
    /// The agency reported something this bridge does not handle.
    Unsupported {
        protocol: ProtocolType,
        action: &'static str,
    },
    /// Applying the callback failed. Anything written before the failure
    /// stays written.
    Failed { error: ListenerError },
}

impl CallbackOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }

    /// The job touched by this callback, if it got that far.
    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Processed { job } => Some(job),
            _ => None,
        }
    }

    /// Writes the outcome to the log.
    pub fn log(&self, tenant_id: &str, protocol: ProtocolType, action: &str) {
        match self {
            Self::Processed { job } => tracing::info!(
                tenant_id,
                %protocol,
                action,
                job_id = %job.id,
                status = %job.status,
                result = %job.result,
                "callback processed"
            ),
            Self::Unchanged { job_id } => tracing::debug!(
                tenant_id,
                %protocol,
                action,
                job_id = %job_id,
                "callback left job unchanged"
            ),
            Self::Unsupported { protocol, action } => tracing::warn!(
                tenant_id,
                %protocol,
                action,
                "callback not supported"
            ),
            Self::Failed { error } => tracing::warn!(
                tenant_id,
                %protocol,
                action,
                error = %error,
                "callback failed"
            ),
        }
    }
}
