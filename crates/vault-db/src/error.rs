//! Error types for the store.

/// Errors a [`Store`](crate::Store) can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced row does not exist for this tenant.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Which kind of record was looked up (`job`, `credential`, ...).
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A row with the same key already exists for this tenant.
    #[error("{entity} already exists: {id}")]
    Duplicate {
        entity: &'static str,
        id: String,
    },

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization or deserialization of a column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A schema upgrade step failed and was rolled back.
    #[error("schema upgrade to version {version} failed: {source}")]
    Schema {
        version: usize,
        source: rusqlite::Error,
    },

    /// The database was written by a newer build than this one.
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: usize },

    /// The backend refused the write without a more specific cause.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a unique/primary key violation to [`StoreError::Duplicate`].
    pub(crate) fn on_insert(entity: &'static str, id: &str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Duplicate {
                    entity,
                    id: id.to_string(),
                }
            }
            other => Self::Database(other),
        }
    }

    /// Whether this error means the record is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
