//! Provider adapter: bounded-time embedding with validation and a pinned
//! dimension.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::validate::EmbeddingValidator;

/// Default upper bound on a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps an [`EmbeddingProvider`] with a timeout and output validation.
///
/// The first vector that passes validation pins the dimension unless one
/// was configured up front. Every later vector must match it, so all stored
/// embeddings share one dimensionality.
pub struct EmbeddingAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    validator: EmbeddingValidator,
    timeout: Duration,
    dimension: OnceLock<usize>,
    requested_dimension: Option<usize>,
}

impl EmbeddingAdapter {
    /// Create an adapter with the default timeout and validator.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            validator: EmbeddingValidator::default(),
            timeout: DEFAULT_TIMEOUT,
            dimension: OnceLock::new(),
            requested_dimension: None,
        }
    }

    /// Set the provider call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the validator.
    pub fn with_validator(mut self, validator: EmbeddingValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Pin the expected dimension up front and ask the provider for it.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        // A fresh OnceLock always accepts the first value.
        let _ = self.dimension.set(dimension);
        self.requested_dimension = Some(dimension);
        self
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// The pinned dimension, if any vector has been accepted yet.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Embed text and validate the result.
    ///
    /// No caching and no retry: a timeout surfaces as
    /// [`EmbeddingError::Timeout`] and a degenerate vector as
    /// [`EmbeddingError::InvalidEmbedding`].
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut request = EmbeddingRequest::new(text);
        if let Some(dimension) = self.requested_dimension {
            request = request.with_dimensions(dimension);
        }

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                warn!(
                    "Embedding provider {} timed out after {:?}",
                    self.provider.name(),
                    self.timeout
                );
                EmbeddingError::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            })??;

        self.validate(&response.embedding)?;
        debug!(
            "Accepted {}-dimensional embedding from {}",
            response.dimension,
            self.provider.name()
        );

        Ok(response.embedding)
    }

    /// Run the validator and the pinned-dimension check.
    pub fn validate(&self, vector: &[f32]) -> Result<()> {
        self.validator.check(vector)?;

        let pinned = *self.dimension.get_or_init(|| vector.len());
        if pinned != vector.len() {
            return Err(EmbeddingError::InvalidEmbedding(format!(
                "dimension mismatch: expected {pinned}, got {}",
                vector.len()
            )));
        }

        Ok(())
    }
}
