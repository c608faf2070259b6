//! # Document Store
//!
//! Access-controlled document storage with semantic similarity search.
//!
//! Callers (authenticated users or anonymous) upload free text, which is
//! sanitized, embedded through a configurable provider and persisted with
//! its vector. Searches embed the query, rank every visible document by
//! cosine similarity and return redacted previews.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        DocumentStore                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Sanitizer   │  │ RateLimiter  │  │  Embedding   │           │
//! │  │              │  │              │  │   Adapter    │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │  ┌──────────────┐  ┌──────────────┐                             │
//! │  │  Document    │─►│  Similarity  │──► redacted results         │
//! │  │  Repository  │  │ SearchEngine │                             │
//! │  └──────────────┘  └──────────────┘                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semdoc_store::{DocumentStore, Principal, SearchRequest, UploadRequest};
//!
//! let store = DocumentStore::builder()
//!     .with_data_dir("/var/lib/semdoc")
//!     .build()
//!     .await?;
//!
//! let alice = Principal::User("alice".to_string());
//! store.upload(UploadRequest::new("cats are great pets"), &alice).await?;
//!
//! let hits = store.search(SearchRequest::new("I love my cat"), &alice).await?;
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod rate_limit;
pub mod repository;
pub mod sanitizer;
pub mod search;
pub mod service;
pub mod tool;

pub use config::{ContentConfig, EmbeddingConfig, EmbeddingProviderType, StoreConfig};
pub use document::{DocumentFilter, DocumentId, DocumentMetadata, Principal, StoredDocument};
pub use error::{RepositoryError, Result, StoreError};
pub use rate_limit::{RateLimitConfig, RateLimiter, SlidingWindowLimiter, Unlimited};
pub use repository::{DocumentRepository, LocalRepository};
pub use sanitizer::{Sanitizer, SanitizerLimits};
pub use search::{ScoredDocument, SearchConfig, SimilaritySearchEngine};
pub use service::{
    DocumentStore, DocumentStoreBuilder, DocumentSummary, DocumentView, SearchHit, SearchRequest,
    StoreStats, UploadReceipt, UploadRequest, provider_from_config,
};
pub use tool::DocumentSearchTool;

// Re-export from dependencies for convenience
pub use semdoc_embeddings::{EmbeddingAdapter, EmbeddingProvider, HashingProvider};
