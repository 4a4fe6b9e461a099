//! Error types for the event journal.

use vault_db::StoreError;

/// Errors returned by [`Updater`](crate::Updater) operations.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The store rejected the read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EventError {
    /// Whether this error means a referenced record is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
