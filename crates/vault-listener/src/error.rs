use vault_db::StoreError;
use vault_events::EventError;

/// Errors raised while applying an agency callback.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Event(#[from] EventError),

    /// The callback contradicts what is already stored.
    #[error("invalid callback: {0}")]
    Invalid(String),
}

impl ListenerError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) => e.is_not_found(),
            Self::Event(e) => e.is_not_found(),
            Self::Invalid(_) => false,
        }
    }
}
