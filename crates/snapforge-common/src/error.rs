//! Error types shared across the Snapshot Refresh Engine.

use thiserror::Error;

/// Result type alias for snapforge operations.
pub type Result<T> = std::result::Result<T, SnapError>;

/// Domain error type covering the failure modes enumerated in the
/// engine's error-handling design: transient network, protocol, warehouse
/// failure, parse, persistence, detector, and cancellation.
#[derive(Error, Debug)]
pub enum SnapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level failure talking to the warehouse: connection reset,
    /// 5xx, or a `RUNNING` status that outlived its deadline. Retryable.
    #[error("transient warehouse error: {0}")]
    TransientWarehouse(String),

    /// Wire-protocol violation: missing query id, or a status string other
    /// than FINISHED/COMPLETED/FAILED/ERROR/RUNNING/PENDING. Not retryable.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The warehouse itself reported `FAILED`/`ERROR` for a submitted query.
    #[error("warehouse query failed: {0}")]
    WarehouseFailure(String),

    /// A row failed to parse: missing required column, or a value that
    /// doesn't fit any of the loose-typing extractor shapes.
    #[error("row parse error: {0}")]
    Parse(String),

    /// Batch upsert into the relational store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Bus publish/subscribe failure.
    #[error("bus error: {0}")]
    Bus(String),

    /// Job id, phase name, or subject could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SnapError {
    /// Whether a caller should retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SnapError::TransientWarehouse(_))
    }
}
