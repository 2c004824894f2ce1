//! Base semantic retriever: embed the query, search the store.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::embedder::Embedder;
use crate::errors::retrieval_error::{RetrievalError, Result};
use crate::store::{Metadata, MetadataFilter, VectorStore};

/// A retrieved document chunk.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Chunk text.
    pub content: String,
    /// Relevance score, higher is better.
    pub score: f32,
    /// Chunk metadata (topic, difficulty, source, ...).
    pub metadata: Metadata,
    /// Stable chunk identifier.
    pub chunk_id: String,
}

/// Semantic retrieval over an [`Embedder`] and a [`VectorStore`].
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Retrieve up to `n_results` chunks relevant to `query`.
    ///
    /// `min_score`, when set, drops results scoring below it.
    ///
    /// # Errors
    /// [`RetrievalError::EmptyQuery`] for blank queries; embedding and
    /// store failures are passed through.
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        filters: Option<&MetadataFilter>,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let query_embedding = self.embedder.embed(query).await?;
        let hits = self
            .store
            .query(&query_embedding, n_results, filters)
            .await?;

        debug!(
            target: "rag_retrieval::retriever",
            n = hits.len(),
            "semantic retrieval"
        );

        let mut results: Vec<RetrievalResult> = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                content: hit.content,
                score: hit.score,
                metadata: hit.metadata,
                chunk_id: hit.id,
            })
            .collect();

        if let Some(threshold) = min_score {
            results.retain(|r| r.score >= threshold);
        }
        Ok(results)
    }

    /// Retrieve chunks from one topic only.
    pub async fn retrieve_by_topic(
        &self,
        query: &str,
        topic: &str,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let filter: MetadataFilter = [("topic".to_string(), json!(topic))].into();
        self.retrieve(query, n_results, Some(&filter), None).await
    }

    /// Retrieve chunks at or below `max_difficulty` (1-5).
    ///
    /// Difficulty filtering happens client-side, so twice as many
    /// candidates are fetched first. Chunks without a difficulty field
    /// are treated as hardest (5).
    pub async fn retrieve_by_difficulty(
        &self,
        query: &str,
        max_difficulty: u8,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let mut results = self.retrieve(query, n_results * 2, None, None).await?;
        results.retain(|r| {
            let difficulty = r
                .metadata
                .get("difficulty")
                .and_then(|v| v.as_u64())
                .unwrap_or(5);
            difficulty <= u64::from(max_difficulty)
        });
        results.truncate(n_results);
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;

    use super::*;

    /// Embedder that projects text onto fixed keyword axes. Texts
    /// sharing keywords embed close together; everything is local and
    /// deterministic.
    pub struct KeywordEmbedder {
        pub axes: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        pub fn calculus() -> Self {
            Self {
                axes: vec!["chain", "limit", "derivative", "integral"],
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dimension(&self) -> usize {
            self.axes.len()
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(self
                .axes
                .iter()
                .map(|axis| if lower.contains(axis) { 1.0 } else { 0.0 })
                .collect())
        }
    }
}
