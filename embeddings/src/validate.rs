//! Sanity checks applied to every vector a provider hands back.

use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Smallest dimensionality accepted by default.
pub const DEFAULT_MIN_DIMENSION: usize = 64;

/// Largest dimensionality accepted by default.
pub const DEFAULT_MAX_DIMENSION: usize = 4096;

/// Rejects degenerate vectors before they are stored or compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingValidator {
    /// Minimum accepted dimensionality.
    pub min_dimension: usize,

    /// Maximum accepted dimensionality.
    pub max_dimension: usize,
}

impl EmbeddingValidator {
    /// Create a validator accepting dimensions in `min..=max`.
    pub fn new(min_dimension: usize, max_dimension: usize) -> Self {
        Self {
            min_dimension,
            max_dimension,
        }
    }

    /// Whether the vector passes every check.
    pub fn validate(&self, vector: &[f32]) -> bool {
        self.check(vector).is_ok()
    }

    /// Check a vector, reporting the first failed rule.
    pub fn check(&self, vector: &[f32]) -> Result<()> {
        let dimension = vector.len();
        if !(self.min_dimension..=self.max_dimension).contains(&dimension) {
            return Err(EmbeddingError::InvalidEmbedding(format!(
                "dimension {dimension} outside {}..={}",
                self.min_dimension, self.max_dimension
            )));
        }

        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(EmbeddingError::InvalidEmbedding(format!(
                "non-finite component at position {position}"
            )));
        }

        if vector.iter().all(|x| *x == 0.0) {
            return Err(EmbeddingError::InvalidEmbedding("zero vector".to_string()));
        }

        Ok(())
    }
}

impl Default for EmbeddingValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DIMENSION, DEFAULT_MAX_DIMENSION)
    }
}
