//! In-process vector store.
//!
//! Brute-force cosine similarity plus token-overlap keyword search.
//! Backs the unit tests and the demo binary when no Qdrant endpoint is
//! configured; not meant for large corpora.

use tokio::sync::RwLock;

use async_trait::async_trait;

use crate::errors::retrieval_error::{RetrievalError, Result};
use crate::store::{Metadata, MetadataFilter, QueryResult, VectorStore};

/// English stop words excluded from keyword matching.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "was", "her", "have",
];

/// Tokens worth matching: lowercase, longer than 2 chars, no stop words.
pub(crate) fn keyword_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(metadata: &Metadata, filter: Option<&MetadataFilter>) -> bool {
    filter
        .map(|f| f.iter().all(|(k, v)| metadata.get(k) == Some(v)))
        .unwrap_or(true)
}

struct StoredChunk {
    id: String,
    content: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// Vector store held entirely in memory.
#[derive(Default)]
pub struct MemoryVectorStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().await.len())
    }

    async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        if ids.len() != embeddings.len() || ids.len() != documents.len() {
            return Err(RetrievalError::Store(format!(
                "length mismatch: {} ids, {} embeddings, {} documents",
                ids.len(),
                embeddings.len(),
                documents.len()
            )));
        }
        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); ids.len()]);
        if metadatas.len() != ids.len() {
            return Err(RetrievalError::Store(format!(
                "length mismatch: {} ids, {} metadatas",
                ids.len(),
                metadatas.len()
            )));
        }

        let mut chunks = self.chunks.write().await;
        for (((id, embedding), content), metadata) in ids
            .iter()
            .cloned()
            .zip(embeddings)
            .zip(documents)
            .zip(metadatas)
        {
            // Upsert by id.
            chunks.retain(|c| c.id != id);
            chunks.push(StoredChunk {
                id,
                content,
                metadata,
                embedding,
            });
        }
        Ok(ids)
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let chunks = self.chunks.read().await;
        let mut scored: Vec<QueryResult> = chunks
            .iter()
            .filter(|c| matches_filter(&c.metadata, filter))
            .map(|c| QueryResult {
                id: c.id.clone(),
                content: c.content.clone(),
                metadata: c.metadata.clone(),
                score: cosine_similarity(query_embedding, &c.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(n_results);
        Ok(scored)
    }

    async fn fulltext_search(
        &self,
        query_text: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let tokens = keyword_tokens(query_text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read().await;
        let mut scored: Vec<QueryResult> = chunks
            .iter()
            .filter(|c| matches_filter(&c.metadata, filter))
            .filter_map(|c| {
                let content = c.content.to_lowercase();
                let matched = tokens.iter().filter(|t| content.contains(*t)).count();
                if matched == 0 {
                    return None;
                }
                Some(QueryResult {
                    id: c.id.clone(),
                    content: c.content.clone(),
                    metadata: c.metadata.clone(),
                    score: matched as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(n_results);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| !ids.contains(&c.id));
        Ok(())
    }
}
