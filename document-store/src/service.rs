//! The document store: upload, search, read and delete with access control.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use semdoc_embeddings::{
    Embedding, EmbeddingAdapter, EmbeddingError, EmbeddingProvider, EncodedEmbedding,
    HashingProvider, OllamaProvider, OpenAIProvider,
};

use crate::config::{EmbeddingConfig, EmbeddingProviderType, StoreConfig};
use crate::document::{
    DocumentFilter, DocumentId, DocumentMetadata, NewDocument, Principal, StoredDocument,
};
use crate::error::{RepositoryError, Result, StoreError};
use crate::rate_limit::{RateLimiter, SlidingWindowLimiter};
use crate::repository::{DocumentRepository, LocalRepository};
use crate::sanitizer::Sanitizer;
use crate::search::SimilaritySearchEngine;

/// A document submitted for storage.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Raw content; sanitized before anything else happens.
    pub content: String,

    /// Optional JSON object of uploader metadata.
    pub metadata: Option<serde_json::Value>,

    /// Whether only the uploader may read the document.
    pub is_private: bool,
}

impl UploadRequest {
    /// A public upload with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Mark the upload private.
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
}

/// A similarity query.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Query text.
    pub query: String,

    /// Number of results wanted; the configured default when `None`.
    pub top_k: Option<usize>,

    /// Also search the caller's own private documents.
    pub include_private: bool,
}

impl SearchRequest {
    /// Search public documents with the default result count.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Ask for `top_k` results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Include the caller's private documents.
    pub fn including_private(mut self, include_private: bool) -> Self {
        self.include_private = include_private;
        self
    }
}

/// One search result. Carries a redacted preview, never the full content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub preview: String,
    pub similarity: f32,
    pub is_private: bool,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

/// An entry in the caller's own document listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub preview: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

/// A single document as returned to a reader, with redacted content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub content: String,
    pub is_private: bool,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// Number of stored documents.
    pub documents: usize,

    /// Embedding dimension, once known.
    pub dimension: Option<usize>,

    /// Name of the embedding provider.
    pub provider: String,
}

/// Access-controlled document store with semantic search.
///
/// Every operation is independent; the store holds no background tasks.
/// Share it behind an `Arc` across request handlers.
pub struct DocumentStore {
    config: StoreConfig,
    sanitizer: Sanitizer,
    limiter: Arc<dyn RateLimiter>,
    adapter: EmbeddingAdapter,
    repository: Arc<dyn DocumentRepository>,
    engine: SimilaritySearchEngine,
}

impl DocumentStore {
    /// Create a new document store builder.
    pub fn builder() -> DocumentStoreBuilder {
        DocumentStoreBuilder::new()
    }

    /// Build a store entirely from configuration.
    pub async fn from_config(config: StoreConfig) -> Result<Self> {
        DocumentStoreBuilder::new().with_config(config).build().await
    }

    /// Active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Sanitize, embed and persist a document.
    ///
    /// Nothing is persisted unless every step succeeds.
    pub async fn upload(
        &self,
        request: UploadRequest,
        principal: &Principal,
    ) -> Result<UploadReceipt> {
        let content = self.sanitizer.sanitize_input(&request.content)?;
        let metadata = match request.metadata {
            Some(value) => DocumentMetadata::from_value(value)?,
            None => DocumentMetadata::default(),
        };

        if request.is_private && principal.user_id().is_none() {
            return Err(StoreError::Validation(
                "anonymous uploads cannot be private".to_string(),
            ));
        }

        self.check_rate_limit(principal)?;

        let embedding = self.embed(&content).await?;

        let created_at = Utc::now();
        let id = self
            .repository
            .save(NewDocument {
                content,
                embedding: EncodedEmbedding::encode(&embedding),
                metadata,
                is_private: request.is_private,
                author_id: principal.user_id().map(str::to_string),
                created_at,
            })
            .await?;

        info!(
            "Stored document {id} for {} ({} dimensions, private={})",
            principal.bucket(),
            embedding.len(),
            request.is_private
        );

        Ok(UploadReceipt {
            id,
            created_at,
            is_private: request.is_private,
        })
    }

    /// Find the documents most similar to the query that the caller may see.
    pub async fn search(
        &self,
        request: SearchRequest,
        principal: &Principal,
    ) -> Result<Vec<SearchHit>> {
        self.check_rate_limit(principal)?;

        let query = self.sanitizer.sanitize_query(&request.query)?;
        let query_embedding = self.embed(&query).await?;

        let filter = DocumentFilter::visible_to(principal, request.include_private);
        let candidates = self.repository.list(&filter).await?;

        let top_k = request.top_k.unwrap_or(self.config.search.default_top_k);
        let results = self.engine.search(
            &query_embedding,
            candidates,
            top_k,
            self.config.search.min_similarity,
        );

        let hits: Vec<SearchHit> = results
            .into_iter()
            .filter(|result| {
                let visible = filter.matches(&result.document);
                if !visible {
                    error!(
                        "Dropping document {} from results: not visible to {}",
                        result.document.id,
                        principal.bucket()
                    );
                }
                visible
            })
            .map(|result| SearchHit {
                id: result.document.id,
                preview: self.preview(&result.document.content),
                similarity: result.score,
                is_private: result.document.is_private,
                author: result.document.author_label().to_string(),
                created_at: result.document.created_at,
                metadata: self.redact_metadata(result.document.metadata),
            })
            .collect();

        debug!("Search for {} returned {} hits", principal.bucket(), hits.len());
        Ok(hits)
    }

    /// The caller's own documents, newest first.
    pub async fn list_documents(
        &self,
        principal: &Principal,
        include_private: bool,
    ) -> Result<Vec<DocumentSummary>> {
        if principal.user_id().is_none() {
            return Ok(Vec::new());
        }

        let mut documents = self
            .repository
            .list(&DocumentFilter::owned_by(principal, include_private))
            .await?;
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(documents
            .into_iter()
            .map(|doc| DocumentSummary {
                id: doc.id,
                preview: self.preview(&doc.content),
                is_private: doc.is_private,
                created_at: doc.created_at,
                metadata: self.redact_metadata(doc.metadata),
            })
            .collect())
    }

    /// Read one document.
    ///
    /// Unknown ids and documents the caller may not see are both
    /// [`StoreError::NotFound`].
    pub async fn get_document(
        &self,
        id: DocumentId,
        principal: &Principal,
    ) -> Result<DocumentView> {
        let doc = match self.repository.get(id).await? {
            Some(doc) if doc.is_visible_to(principal) => doc,
            _ => return Err(StoreError::NotFound(id)),
        };

        Ok(self.view(doc))
    }

    /// Delete a document owned by the caller.
    ///
    /// Unknown ids and documents owned by someone else are both
    /// [`StoreError::Unauthorized`].
    pub async fn delete(&self, id: DocumentId, principal: &Principal) -> Result<()> {
        match self.repository.delete(id, principal).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(RepositoryError::Unauthorized) => {
                warn!("Rejected delete of document {id} by {}", principal.bucket());
                Err(StoreError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get store statistics.
    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            documents: self.repository.count().await?,
            dimension: self.adapter.dimension(),
            provider: self.adapter.provider_name().to_string(),
        })
    }

    fn check_rate_limit(&self, principal: &Principal) -> Result<()> {
        if self.limiter.allow(principal) {
            Ok(())
        } else {
            Err(StoreError::RateLimited {
                retry_after_secs: self.limiter.retry_after_secs(),
            })
        }
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.adapter.embed(text).await.map_err(|e| match e {
            EmbeddingError::InvalidEmbedding(reason) => {
                warn!("Rejected embedding from {}: {reason}", self.adapter.provider_name());
                StoreError::InvalidEmbedding(reason)
            }
            e if e.is_provider_failure() => {
                warn!("Embedding provider {} failed: {e}", self.adapter.provider_name());
                StoreError::Provider
            }
            e => {
                error!("Unexpected embedding failure: {e}");
                StoreError::Internal
            }
        })
    }

    fn preview(&self, content: &str) -> String {
        self.sanitizer.preview(content, self.config.content.preview_chars)
    }

    fn view(&self, doc: StoredDocument) -> DocumentView {
        DocumentView {
            id: doc.id,
            content: self.sanitizer.redact_output(&doc.content),
            is_private: doc.is_private,
            author: doc.author_label().to_string(),
            created_at: doc.created_at,
            metadata: self.redact_metadata(doc.metadata),
        }
    }

    fn redact_metadata(&self, metadata: DocumentMetadata) -> DocumentMetadata {
        metadata.map_values(|value| self.sanitizer.redact_value(value))
    }
}

/// Build the provider named by the configuration.
pub fn provider_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider {
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new();
            if let Ok(key) = std::env::var(&config.api_key_env) {
                provider = provider.with_api_key(key);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }
        EmbeddingProviderType::Ollama => {
            let mut provider = OllamaProvider::new();
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }
        EmbeddingProviderType::Hashing => match config.dimension {
            Some(dimension) => Arc::new(HashingProvider::new(dimension)),
            None => Arc::new(HashingProvider::default()),
        },
    }
}

/// Builder for [`DocumentStore`].
///
/// Components not supplied explicitly are created from the configuration.
pub struct DocumentStoreBuilder {
    config: StoreConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    repository: Option<Arc<dyn DocumentRepository>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    timeout: Option<Duration>,
}

impl DocumentStoreBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            provider: None,
            repository: None,
            limiter: None,
            timeout: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist documents under `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    /// Select the provider type to build from configuration.
    pub fn with_embedding_provider(mut self, provider: EmbeddingProviderType) -> Self {
        self.config.embedding.provider = provider;
        self
    }

    /// Use a ready-made embedding provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a ready-made repository.
    pub fn with_repository(mut self, repository: Arc<dyn DocumentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Use a ready-made rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Override the provider call timeout with sub-second precision.
    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the store.
    pub async fn build(self) -> Result<DocumentStore> {
        let config = self.config;
        config.validate()?;

        let provider = self
            .provider
            .unwrap_or_else(|| provider_from_config(&config.embedding));
        if !provider.is_available() {
            warn!("Embedding provider {} is not configured", provider.name());
        }

        let mut adapter = EmbeddingAdapter::new(provider)
            .with_timeout(self.timeout.unwrap_or_else(|| config.embedding.timeout()))
            .with_validator(config.embedding.validator());
        if let Some(dimension) = config.embedding.dimension {
            adapter = adapter.with_dimension(dimension);
        }

        let repository: Arc<dyn DocumentRepository> = match (self.repository, &config.data_dir) {
            (Some(repository), _) => repository,
            (None, Some(dir)) => Arc::new(LocalRepository::open(dir).await?),
            (None, None) => Arc::new(LocalRepository::in_memory()),
        };

        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(SlidingWindowLimiter::new(config.rate_limit)));

        let sanitizer = Sanitizer::new(config.content.sanitizer_limits())?;
        let engine = SimilaritySearchEngine::new(config.search.max_top_k);

        info!(
            "Document store ready (provider={}, persisted={})",
            adapter.provider_name(),
            config.data_dir.is_some()
        );

        Ok(DocumentStore {
            config,
            sanitizer,
            limiter,
            adapter,
            repository,
            engine,
        })
    }
}

impl Default for DocumentStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::Unlimited;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn alice() -> Principal {
        Principal::User("alice".to_string())
    }

    async fn store() -> DocumentStore {
        DocumentStore::builder()
            .with_provider(Arc::new(HashingProvider::new(256)))
            .with_rate_limiter(Arc::new(Unlimited))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_builder_defaults_to_in_memory() {
        let store = DocumentStore::builder()
            .with_embedding_provider(EmbeddingProviderType::Hashing)
            .build()
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.dimension, None);
        assert_eq!(stats.provider, "hashing");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = StoreConfig::default();
        config.rate_limit.window_secs = 0;

        let result = DocumentStore::from_config(config).await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_anonymous_private_upload_is_rejected() {
        let store = store().await;
        let err = store
            .upload(UploadRequest::new("secret").private(), &Principal::Anonymous)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.stats().await.unwrap().documents, 0);
    }

    #[tokio::test]
    async fn test_invalid_metadata_is_rejected() {
        let store = store().await;
        let err = store
            .upload(
                UploadRequest::new("text").with_metadata(json!(["not", "an", "object"])),
                &alice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_stores_sanitized_content_and_metadata() {
        let store = store().await;
        let receipt = store
            .upload(
                UploadRequest::new("  notes <script>steal()</script>about rust  ")
                    .with_metadata(json!({ "source": "wiki" })),
                &alice(),
            )
            .await
            .unwrap();

        let view = store.get_document(receipt.id, &alice()).await.unwrap();
        assert_eq!(view.content, "notes about rust");
        assert_eq!(view.author, "alice");
        assert_eq!(view.metadata.get("source"), Some(&json!("wiki")));
        assert_eq!(store.stats().await.unwrap().dimension, Some(256));
    }

    #[tokio::test]
    async fn test_get_document_hides_private_documents() {
        let store = store().await;
        let id = store
            .upload(UploadRequest::new("alice only").private(), &alice())
            .await
            .unwrap()
            .id;

        let bob = Principal::User("bob".to_string());
        assert!(matches!(
            store.get_document(id, &bob).await,
            Err(StoreError::NotFound(found)) if found == id
        ));
        assert!(matches!(store.get_document(999, &alice()).await, Err(StoreError::NotFound(999))));
        assert!(store.get_document(id, &alice()).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_documents_newest_first() {
        let store = store().await;
        let first = store.upload(UploadRequest::new("first note"), &alice()).await.unwrap().id;
        let second = store
            .upload(UploadRequest::new("second note").private(), &alice())
            .await
            .unwrap()
            .id;
        store
            .upload(UploadRequest::new("bob's note"), &Principal::User("bob".to_string()))
            .await
            .unwrap();

        let all: Vec<DocumentId> = store
            .list_documents(&alice(), true)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(all, vec![second, first]);

        let public = store.list_documents(&alice(), false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, first);

        assert!(store.list_documents(&Principal::Anonymous, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_missing_document_is_unauthorized() {
        let store = store().await;
        assert!(matches!(store.delete(42, &alice()).await, Err(StoreError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_hit_author_label() {
        let store = store().await;
        store
            .upload(UploadRequest::new("anonymous gardening tips"), &Principal::Anonymous)
            .await
            .unwrap();

        let hits = store
            .search(SearchRequest::new("gardening tips"), &alice())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].author, "Anonymous");
    }
}
