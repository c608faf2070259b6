//! Similarity search over a snapshot of stored documents.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use semdoc_embeddings::{cosine_similarity, rank_top_k};

use crate::document::StoredDocument;

/// Fewest results a search returns when anything qualifies.
pub const MIN_TOP_K: usize = 1;

/// Most results a search ever returns.
pub const MAX_TOP_K: usize = 20;

/// Default minimum cosine similarity for a result.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.1;

/// Search tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a count.
    pub default_top_k: usize,

    /// Hard ceiling on results, never above [`MAX_TOP_K`].
    pub max_top_k: usize,

    /// Results scoring below this are dropped before ranking.
    pub min_similarity: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: MAX_TOP_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// A document paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matched document.
    pub document: StoredDocument,

    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Ranks candidate documents by cosine similarity to a query vector.
#[derive(Debug, Clone, Copy)]
pub struct SimilaritySearchEngine {
    max_top_k: usize,
}

impl SimilaritySearchEngine {
    /// Create an engine whose result ceiling is `max_top_k`, itself capped
    /// at [`MAX_TOP_K`].
    pub fn new(max_top_k: usize) -> Self {
        Self {
            max_top_k: max_top_k.clamp(MIN_TOP_K, MAX_TOP_K),
        }
    }

    /// Clamp a caller-supplied result count.
    pub fn clamp_top_k(&self, top_k: usize) -> usize {
        top_k.clamp(MIN_TOP_K, self.max_top_k)
    }

    /// Score, filter and rank `candidates` against `query`.
    ///
    /// Candidates whose stored vector cannot be decoded are logged and
    /// skipped. Candidates of a different dimensionality are skipped. Ties
    /// keep candidate order.
    pub fn search(
        &self,
        query: &[f32],
        candidates: Vec<StoredDocument>,
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<ScoredDocument> {
        let top_k = self.clamp_top_k(top_k);
        let total = candidates.len();

        let mut scored = Vec::with_capacity(total);
        for document in candidates {
            let embedding = match document.embedding.decode() {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!("Skipping document {} with corrupt embedding: {e}", document.id);
                    continue;
                }
            };

            match cosine_similarity(query, &embedding) {
                Ok(score) => scored.push((document, score)),
                Err(e) => debug!("Skipping document {}: {e}", document.id),
            }
        }

        let results: Vec<ScoredDocument> = rank_top_k(scored, top_k, min_similarity)
            .into_iter()
            .map(|(document, score)| ScoredDocument { document, score })
            .collect();

        debug!(
            "Ranked {} of {total} candidates (top_k={top_k}, min_similarity={min_similarity})",
            results.len()
        );
        results
    }
}

impl Default for SimilaritySearchEngine {
    fn default() -> Self {
        Self::new(MAX_TOP_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, NewDocument};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use semdoc_embeddings::EncodedEmbedding;
    use tracing_test::traced_test;

    fn doc(id: u64, embedding: EncodedEmbedding) -> StoredDocument {
        NewDocument {
            content: format!("doc {id}"),
            embedding,
            metadata: DocumentMetadata::default(),
            is_private: false,
            author_id: None,
            created_at: Utc::now(),
        }
        .into_stored(id)
    }

    fn vector_doc(id: u64, vector: &[f32]) -> StoredDocument {
        doc(id, EncodedEmbedding::encode(vector))
    }

    fn ids(results: &[ScoredDocument]) -> Vec<u64> {
        results.iter().map(|r| r.document.id).collect()
    }

    #[test]
    fn test_ranks_by_similarity() {
        let engine = SimilaritySearchEngine::default();
        let candidates = vec![
            vector_doc(1, &[0.0, 1.0, 0.0]),
            vector_doc(2, &[1.0, 0.0, 0.0]),
            vector_doc(3, &[0.7, 0.7, 0.0]),
        ];

        let results = engine.search(&[1.0, 0.0, 0.0], candidates, 5, 0.1);
        assert_eq!(ids(&results), vec![2, 3]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_is_clamped() {
        let engine = SimilaritySearchEngine::default();
        let candidates: Vec<StoredDocument> =
            (1..=30).map(|id| vector_doc(id, &[1.0, 0.5])).collect();

        assert_eq!(engine.search(&[1.0, 0.5], candidates.clone(), 1000, 0.1).len(), MAX_TOP_K);
        assert_eq!(engine.search(&[1.0, 0.5], candidates, 0, 0.1).len(), 1);
    }

    #[test]
    fn test_configured_ceiling_never_exceeds_max() {
        assert_eq!(SimilaritySearchEngine::new(500).clamp_top_k(500), MAX_TOP_K);
        assert_eq!(SimilaritySearchEngine::new(3).clamp_top_k(10), 3);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let engine = SimilaritySearchEngine::default();
        let candidates = vec![
            vector_doc(7, &[1.0, 0.0]),
            vector_doc(3, &[2.0, 0.0]),
            vector_doc(5, &[0.5, 0.0]),
        ];

        let results = engine.search(&[1.0, 0.0], candidates, 10, 0.1);
        assert_eq!(ids(&results), vec![7, 3, 5]);
    }

    #[test]
    fn test_mismatched_dimensions_are_skipped() {
        let engine = SimilaritySearchEngine::default();
        let candidates = vec![vector_doc(1, &[1.0, 0.0, 0.0, 0.0]), vector_doc(2, &[1.0, 0.0])];

        let results = engine.search(&[1.0, 0.0], candidates, 5, 0.1);
        assert_eq!(ids(&results), vec![2]);
    }

    #[test]
    fn test_below_threshold_is_excluded() {
        let engine = SimilaritySearchEngine::default();
        let candidates = vec![vector_doc(1, &[0.05, 1.0]), vector_doc(2, &[-1.0, 0.0])];

        assert!(engine.search(&[1.0, 0.0], candidates, 5, 0.1).is_empty());
    }

    #[traced_test]
    #[test]
    fn test_corrupt_embedding_is_logged_and_skipped() {
        let engine = SimilaritySearchEngine::default();
        let candidates = vec![
            doc(1, EncodedEmbedding::from_bytes(vec![1, 2, 3])),
            vector_doc(2, &[1.0, 0.0]),
        ];

        let results = engine.search(&[1.0, 0.0], candidates, 5, 0.1);
        assert_eq!(ids(&results), vec![2]);
        assert!(logs_contain("Skipping document 1 with corrupt embedding"));
    }
}
