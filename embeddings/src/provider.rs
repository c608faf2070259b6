//! Embedding providers.
//!
//! Supports OpenAI-compatible APIs, a local Ollama server, and an in-process
//! feature-hashing embedder that needs no network at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Dimensions for the output (if supported by provider).
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dimensions: None,
        }
    }

    /// Ask for a specific output dimension, where the provider supports it.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

impl EmbeddingResponse {
    fn from_vector(embedding: Embedding, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
            tokens_used: None,
        }
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        match self.default_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let model = &self.default_model;

        debug!("Generating embedding with model: {model}");

        let mut body = serde_json::json!({
            "input": request.text,
            "model": model
        });

        if let Some(dims) = request.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "status {status}: {error_text}"
            )));
        }

        let result: OpenAIEmbeddingResponse = response.json().await?;
        let tokens_used = result.usage.map(|u| u.total_tokens);

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        let mut response = EmbeddingResponse::from_vector(embedding, result.model);
        response.tokens_used = tokens_used;

        info!("Generated embedding with {} dimensions", response.dimension);
        Ok(response)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

/// Ollama embedding provider.
///
/// Talks to the `/api/embeddings` endpoint of a local or sidecar Ollama
/// server.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
    default_model: String,
}

impl OllamaProvider {
    /// Create a provider pointing at the default local Ollama address.
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            client: reqwest::Client::new(),
            default_model: "llama3.1:8b-instruct-q8_0".to_string(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        if self.default_model.starts_with("nomic-embed-text") {
            768
        } else if self.default_model.starts_with("all-minilm") {
            384
        } else {
            4096
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = &self.default_model;

        debug!("Generating Ollama embedding with model: {model}");

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&serde_json::json!({
                "model": model,
                "prompt": request.text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "status {status}: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await?;
        if result.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding in response".to_string(),
            ));
        }

        let response = EmbeddingResponse::from_vector(result.embedding, model);
        info!("Generated embedding with {} dimensions", response.dimension);
        Ok(response)
    }

    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }
}

/// Deterministic in-process embedder based on signed feature hashing.
///
/// Each lowercase word (crudely singularised) is hashed into one of
/// `dimension` buckets. Texts sharing words get a positive cosine
/// similarity; texts with no usable words embed to the zero vector.
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a hashing provider with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed text synchronously.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }

        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a. Stored vectors depend on this exact function.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(|word| {
            let word = word.to_lowercase();
            match word.strip_suffix('s') {
                Some(stem) if stem.chars().count() > 2 && !stem.ends_with('s') => stem.to_string(),
                _ => word,
            }
        })
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        "feature-hashing"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let mut response =
            EmbeddingResponse::from_vector(self.embed_text(&request.text), self.default_model());
        response.tokens_used = Some(tokenize(&request.text).count() as u64);
        Ok(response)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world").with_dimensions(512);

        assert_eq!(request.text, "Hello world");
        assert_eq!(request.dimensions, Some(512));
    }

    #[test]
    fn test_openai_provider_default_dimensions() {
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);
    }

    #[tokio::test]
    async fn test_openai_embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3], "index": 0 }],
                "model": "text-embedding-3-small",
                "usage": { "prompt_tokens": 2, "total_tokens": 2 }
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let response = provider.embed(EmbeddingRequest::new("hello")).await.unwrap();

        assert_eq!(response.dimension, 3);
        assert_eq!(response.tokens_used, Some(2));
    }

    #[tokio::test]
    async fn test_openai_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let err = provider.embed(EmbeddingRequest::new("hello")).await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_openai_requires_key() {
        let provider = OpenAIProvider {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
        };
        assert!(!provider.is_available());
        let err = provider.embed(EmbeddingRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }

    #[tokio::test]
    async fn test_ollama_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(serde_json::json!({ "prompt": "hello" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [1.0, 0.0, 0.5, 0.25] })),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let response = provider.embed(EmbeddingRequest::new("hello")).await.unwrap();

        assert_eq!(response.embedding, vec![1.0, 0.0, 0.5, 0.25]);
        assert_eq!(response.model, "llama3.1:8b-instruct-q8_0");
    }

    #[tokio::test]
    async fn test_ollama_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let err = provider.embed(EmbeddingRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ApiRequest(_)));
        assert!(err.is_provider_failure());
    }

    #[test]
    fn test_tokenize_singularises() {
        let tokens: Vec<String> = tokenize("Cats, glass & a dog!").collect();
        assert_eq!(tokens, vec!["cat", "glass", "dog"]);
    }

    #[test]
    fn test_hashing_provider_is_deterministic() {
        let provider = HashingProvider::new(64);
        assert_eq!(provider.embed_text("hello world"), provider.embed_text("hello world"));
        assert_eq!(provider.embed_text("hello world").len(), 64);
    }

    #[test]
    fn test_hashing_provider_shared_words_score_higher() {
        let provider = HashingProvider::default();
        let query = provider.embed_text("I love my cat");
        let related = provider.embed_text("cats are great pets");
        let unrelated = provider.embed_text("the stock market fell today");

        let related_score = cosine_similarity(&query, &related).unwrap();
        let unrelated_score = cosine_similarity(&query, &unrelated).unwrap();
        assert!(related_score > unrelated_score);
    }

    #[test]
    fn test_fnv1a_is_pinned() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"cat"), 0xf5e3_0719_0ce4_a327);
    }

    #[test]
    fn test_hashing_bucket_is_stable() {
        let vector = HashingProvider::new(256).embed_text("cat");
        let mut expected = vec![0.0; 256];
        expected[39] = -1.0;
        assert_eq!(vector, expected);
    }

    #[test]
    fn test_hashing_provider_empty_text_is_zero() {
        let provider = HashingProvider::new(16);
        assert!(provider.embed_text("!! ?").iter().all(|x| *x == 0.0));
    }
}
