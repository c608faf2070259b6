//! Error types for the document store.
//!
//! [`StoreError`] is the taxonomy callers branch on. Its messages never carry
//! provider responses, file paths or query text; those stay in the logs.

use thiserror::Error;

use crate::document::DocumentId;

/// Result type alias for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced to callers of the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Bad, empty or oversized input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller exceeded the request budget for the current window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The embedding provider failed or timed out.
    #[error("embedding provider unavailable")]
    Provider,

    /// The embedding provider returned a degenerate vector.
    #[error("embedding rejected: {0}")]
    InvalidEmbedding(String),

    /// Ownership or visibility violation.
    #[error("not authorized")]
    Unauthorized,

    /// Unknown (or invisible) document.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// Persistence failure; details are only logged.
    #[error("internal error")]
    Internal,

    /// Invalid configuration at construction time.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Provider)
    }

    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidEmbedding(_) | Self::Unauthorized | Self::NotFound(_)
        )
    }
}

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Requester does not own the document.
    #[error("requester does not own the document")]
    Unauthorized,

    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a document record.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a document record.
    #[error("failed to write file: {0}")]
    WriteFile(String),

    /// Failed to delete a document record.
    #[error("failed to delete file: {0}")]
    DeleteFile(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unauthorized => StoreError::Unauthorized,
            other => {
                tracing::error!("Repository failure: {other}");
                StoreError::Internal
            }
        }
    }
}
