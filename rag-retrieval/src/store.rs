//! The vector store contract.
//!
//! Stores expose semantic k-NN search, full-text search, and a hybrid
//! search. Hybrid search has a default implementation that fuses the two
//! native searches with Reciprocal Rank Fusion, so any backend gets it
//! for free; [`VectorStore::supports_hybrid`] reports whether the
//! backend considers its keyword recall good enough to rely on.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::retrieval_error::Result;
use crate::fusion;

/// Open key-value metadata attached to a chunk.
pub type Metadata = HashMap<String, Value>;

/// Equality filter over metadata keys; all entries must match.
pub type MetadataFilter = HashMap<String, Value>;

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Semantic: similarity in [0, 1]. Full-text: unbounded relevance
    /// rank. Hybrid: fused RRF score.
    #[serde(default)]
    pub score: f32,
}

/// Async vector store over embedded text chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of chunks stored.
    async fn count(&self) -> Result<usize>;

    /// Upsert chunks; returns the ids written.
    async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>>;

    /// Semantic k-NN search, best first.
    async fn query(
        &self,
        query_embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>>;

    /// Keyword search, best first. Scores are unbounded relevance ranks.
    async fn fulltext_search(
        &self,
        query_text: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>>;

    /// Delete chunks by id.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Whether hybrid search is worth preferring over plain semantic
    /// search for this backend. Checked once at retriever construction.
    fn supports_hybrid(&self) -> bool {
        false
    }

    /// Hybrid search: RRF fusion of semantic and keyword results.
    ///
    /// Both searches are asked for `3 * n_results` candidates so the
    /// fusion has enough overlap to work with.
    async fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        n_results: usize,
        semantic_weight: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let k = n_results * 3;
        let semantic = self.query(query_embedding, k, filter).await?;
        let keyword = self.fulltext_search(query_text, k, filter).await?;
        Ok(fusion::rrf_fuse(semantic, keyword, semantic_weight, n_results))
    }
}
