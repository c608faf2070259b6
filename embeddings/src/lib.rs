//! # Embeddings
//!
//! Embedding generation, validation and similarity ranking for the semdoc
//! document store.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors via OpenAI, Ollama or a local hashing model
//! - **Hardening**: Bounded provider calls and rejection of degenerate vectors
//! - **Compact Storage**: Packed little-endian vector encoding
//! - **Similarity Search**: Cosine scoring with stable top-k ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► EmbeddingAdapter ──► EncodedEmbedding   │
//! │       │                    │                      │             │
//! │       ▼                    ▼                      ▼             │
//! │  OpenAI/Ollama/Hash  EmbeddingValidator    cosine_similarity   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod codec;
pub mod error;
pub mod provider;
pub mod similarity;
pub mod validate;

pub use adapter::EmbeddingAdapter;
pub use codec::EncodedEmbedding;
pub use error::{EmbeddingError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OllamaProvider,
    OpenAIProvider,
};
pub use similarity::{cosine_similarity, rank_top_k};
pub use validate::EmbeddingValidator;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
