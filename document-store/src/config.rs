//! Configuration for the document store.
//!
//! Every section has defaults, so a TOML file only needs the keys it
//! changes:
//!
//! ```toml
//! data_dir = "/var/lib/semdoc"
//!
//! [embedding]
//! provider = "ollama"
//! base_url = "http://ollama:11434"
//!
//! [rate_limit]
//! max_requests = 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use semdoc_embeddings::EmbeddingValidator;
use semdoc_embeddings::validate::{DEFAULT_MAX_DIMENSION, DEFAULT_MIN_DIMENSION};

use crate::error::{Result, StoreError};
use crate::rate_limit::RateLimitConfig;
use crate::sanitizer::SanitizerLimits;
use crate::search::SearchConfig;

/// Configuration for the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for persisted documents; `None` keeps them in memory.
    pub data_dir: Option<PathBuf>,

    /// Content limits.
    pub content: ContentConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Search tuning.
    pub search: SearchConfig,

    /// Request throttling.
    pub rate_limit: RateLimitConfig,
}

impl StoreConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Default on-disk location for documents.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir().unwrap_or_default().join("semdoc/documents")
    }

    /// Persist documents under `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the rate limit configuration.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    /// Reject settings that cannot work together.
    pub fn validate(&self) -> Result<()> {
        if self.content.max_content_chars == 0 || self.content.max_query_chars == 0 {
            return Err(StoreError::Config(
                "content limits must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(StoreError::Config(
                "rate limit window and request budget must be positive".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.min_similarity) {
            return Err(StoreError::Config(
                "min_similarity must be within [-1, 1]".to_string(),
            ));
        }
        if self.embedding.min_dimension > self.embedding.max_dimension {
            return Err(StoreError::Config(
                "min_dimension exceeds max_dimension".to_string(),
            ));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(StoreError::Config(
                "embedding timeout must be positive".to_string(),
            ));
        }
        let accepted = self.embedding.min_dimension..=self.embedding.max_dimension;
        if let Some(dimension) = self.embedding.dimension
            && !accepted.contains(&dimension)
        {
            return Err(StoreError::Config(format!(
                "embedding dimension {dimension} outside the accepted range"
            )));
        }
        Ok(())
    }
}

/// Content size limits, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Maximum stored document length.
    pub max_content_chars: usize,

    /// Maximum search query length.
    pub max_query_chars: usize,

    /// Length of previews returned from searches.
    pub preview_chars: usize,
}

impl ContentConfig {
    /// Limits for the sanitizer.
    pub fn sanitizer_limits(&self) -> SanitizerLimits {
        SanitizerLimits {
            max_content_chars: self.max_content_chars,
            max_query_chars: self.max_query_chars,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        let limits = SanitizerLimits::default();
        Self {
            max_content_chars: limits.max_content_chars,
            max_query_chars: limits.max_query_chars,
            preview_chars: 200,
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// Provider base URL override.
    pub base_url: Option<String>,

    /// Environment variable holding the API key, for providers that need one.
    pub api_key_env: String,

    /// Upper bound on one provider call, in seconds.
    pub timeout_secs: u64,

    /// Expected dimension; pinned from the first vector when unset.
    pub dimension: Option<usize>,

    /// Smallest accepted dimension.
    pub min_dimension: usize,

    /// Largest accepted dimension.
    pub max_dimension: usize,
}

impl EmbeddingConfig {
    /// Provider call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validator matching the configured range.
    pub fn validator(&self) -> EmbeddingValidator {
        EmbeddingValidator::new(self.min_dimension, self.max_dimension)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Ollama,
            model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            dimension: None,
            min_dimension: DEFAULT_MIN_DIMENSION,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API (or a compatible server).
    #[serde(rename = "openai")]
    OpenAI,
    /// Ollama server.
    Ollama,
    /// In-process feature hashing, no network.
    Hashing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.content.max_content_chars, 10_000);
        assert_eq!(config.content.preview_chars, 200);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.search.min_similarity, 0.1);
        assert_eq!(config.search.max_top_k, 20);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            data_dir = "/tmp/semdoc"

            [embedding]
            provider = "hashing"
            dimension = 256

            [rate_limit]
            max_requests = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/semdoc")));
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
        assert_eq!(config.embedding.dimension, Some(256));
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.search.default_top_k, 5);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("semdoc.toml");
        std::fs::write(&path, "[content]\npreview_chars = 80\n").unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.content.preview_chars, 80);
        assert_eq!(config.content.max_query_chars, 1_000);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = StoreConfig::from_toml_str("rate_limit = 5").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_provider_names() {
        for (name, expected) in [
            ("openai", EmbeddingProviderType::OpenAI),
            ("ollama", EmbeddingProviderType::Ollama),
            ("hashing", EmbeddingProviderType::Hashing),
        ] {
            let config =
                StoreConfig::from_toml_str(&format!("[embedding]\nprovider = \"{name}\"\n"))
                    .unwrap();
            assert_eq!(config.embedding.provider, expected);
        }

        assert!(StoreConfig::from_toml_str("[embedding]\nprovider = \"open_a_i\"\n").is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_limits() {
        let mut config = StoreConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));

        let mut config = StoreConfig::default();
        config.embedding.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = StoreConfig::default();
        config.search.min_similarity = 1.5;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.embedding.dimension = Some(8);
        assert!(config.validate().is_err());
    }
}
