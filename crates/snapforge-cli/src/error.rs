//! Error types for the snapforge CLI

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(String),

    /// Requested job or bulk operation does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid job id supplied on the command line
    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }
}
