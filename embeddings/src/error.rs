//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The provider did not answer within the configured timeout.
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned a degenerate vector.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// A stored vector could not be decoded.
    #[error("failed to decode embedding: {0}")]
    Decode(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether the failure came from the provider call itself (transport,
    /// upstream status, timeout) rather than from what it returned.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotConfigured
                | Self::ApiRequest(_)
                | Self::InvalidResponse(_)
                | Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Serialization(_)
                | Self::Http(_)
        )
    }
}
