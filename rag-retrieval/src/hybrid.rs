//! Hybrid retrieval: semantic + keyword search fused with RRF.
//!
//! Keyword recall catches exact terms the embedding space blurs
//! ("L'Hôpital's rule", "f'(x)"); the semantic side catches
//! paraphrases ("rate of change" for "derivative").

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::embedder::Embedder;
use crate::errors::retrieval_error::{RetrievalError, Result};
use crate::retriever::RetrievalResult;
use crate::store::{MetadataFilter, QueryResult, VectorStore};

/// Hybrid results plus per-method statistics.
#[derive(Debug, Clone)]
pub struct HybridRetrievalResult {
    pub results: Vec<RetrievalResult>,
    pub semantic_count: usize,
    pub keyword_count: usize,
    /// Ids found by both methods.
    pub overlap_count: usize,
}

/// Per-method breakdown for debugging retrieval behavior.
#[derive(Debug, Clone)]
pub struct MethodComparison {
    pub semantic: Vec<RetrievalResult>,
    pub keyword: Vec<RetrievalResult>,
    pub hybrid: Vec<RetrievalResult>,
}

fn to_retrieval_results(hits: Vec<QueryResult>) -> Vec<RetrievalResult> {
    hits.into_iter()
        .map(|hit| RetrievalResult {
            content: hit.content,
            score: hit.score,
            metadata: hit.metadata,
            chunk_id: hit.id,
        })
        .collect()
}

/// Retriever fusing semantic and keyword search.
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    semantic_weight: f32,
}

impl HybridRetriever {
    /// `semantic_weight` is the default fusion weight; 0.7 means 70%
    /// semantic, 30% keyword.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        semantic_weight: f32,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&semantic_weight) {
            return Err(RetrievalError::InvalidConfig(format!(
                "semantic_weight {semantic_weight} out of [0, 1]"
            )));
        }
        Ok(Self {
            embedder,
            store,
            semantic_weight,
        })
    }

    pub fn semantic_weight(&self) -> f32 {
        self.semantic_weight
    }

    /// Hybrid retrieval with overlap statistics.
    ///
    /// Both methods are also run separately at `2 * n_results` to count
    /// how much they agree; the fused list itself comes from the
    /// store's `hybrid_search`.
    ///
    /// # Errors
    /// [`RetrievalError::EmptyQuery`] for blank queries.
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        filters: Option<&MetadataFilter>,
        semantic_weight: Option<f32>,
    ) -> Result<HybridRetrievalResult> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let weight = semantic_weight.unwrap_or(self.semantic_weight);

        let query_embedding = self.embedder.embed(query).await?;

        let (semantic, keyword) = tokio::join!(
            self.store.query(&query_embedding, n_results * 2, filters),
            self.store.fulltext_search(query, n_results * 2, filters),
        );
        let semantic = semantic?;
        let keyword = keyword?;

        let semantic_ids: HashSet<&str> = semantic.iter().map(|r| r.id.as_str()).collect();
        let overlap_count = keyword
            .iter()
            .filter(|r| semantic_ids.contains(r.id.as_str()))
            .count();

        let hybrid = self
            .store
            .hybrid_search(query, &query_embedding, n_results, weight, filters)
            .await?;

        debug!(
            target: "rag_retrieval::hybrid",
            semantic = semantic.len(),
            keyword = keyword.len(),
            overlap = overlap_count,
            fused = hybrid.len(),
            "hybrid retrieval"
        );

        Ok(HybridRetrievalResult {
            results: to_retrieval_results(hybrid),
            semantic_count: semantic.len(),
            keyword_count: keyword.len(),
            overlap_count,
        })
    }

    /// Run each method separately at the same `n_results`; useful for
    /// inspecting how the fusion behaves.
    pub async fn retrieve_with_method_comparison(
        &self,
        query: &str,
        n_results: usize,
        filters: Option<&MetadataFilter>,
    ) -> Result<MethodComparison> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let query_embedding = self.embedder.embed(query).await?;

        let (semantic, keyword) = tokio::join!(
            self.store.query(&query_embedding, n_results, filters),
            self.store.fulltext_search(query, n_results, filters),
        );
        let hybrid = self
            .store
            .hybrid_search(
                query,
                &query_embedding,
                n_results,
                self.semantic_weight,
                filters,
            )
            .await?;

        Ok(MethodComparison {
            semantic: to_retrieval_results(semantic?),
            keyword: to_retrieval_results(keyword?),
            hybrid: to_retrieval_results(hybrid),
        })
    }
}
