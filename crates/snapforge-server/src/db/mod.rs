use thiserror::Error;

pub mod audit;
pub mod issues;
pub mod job_store;
pub mod production_order_view;
pub mod snapshot_tables;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Record already exists (unique constraint violation)
    #[error("{0}")]
    Duplicate(String),
}

impl DbError {
    /// Create a not found error with resource context
    pub fn not_found(resource_type: &str, identifier: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found in database", resource_type, identifier))
    }

    /// Create a duplicate error with resource context
    pub fn duplicate(resource_type: &str, identifier: &str) -> Self {
        Self::Duplicate(format!("{} '{}' already exists", resource_type, identifier))
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<DbError> for snapforge_common::SnapError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => snapforge_common::SnapError::NotFound(msg),
            other => snapforge_common::SnapError::Persistence(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
