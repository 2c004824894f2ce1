//! Qdrant-backed vector store using the modern `qdrant_client` API.
//!
//! - gRPC connect + idempotent collection creation
//! - batched upserts (string chunk ids hashed to stable numeric point
//!   ids; the original id travels in the payload)
//! - filtered k-NN search
//! - keyword recall via scroll + client-side token-overlap scoring,
//!   since Qdrant has no ts_rank equivalent over plain payloads

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::errors::retrieval_error::{RetrievalError, Result};
use crate::memory::keyword_tokens;
use crate::store::{Metadata, MetadataFilter, QueryResult, VectorStore};

/// Scroll at most this many points when scoring keyword recall.
const SCROLL_CAP: usize = 4000;

/// Vector store backed by a Qdrant collection.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    /// Connect over gRPC and create the collection (cosine distance)
    /// if it does not exist yet.
    ///
    /// # Errors
    /// [`RetrievalError::Qdrant`] on client build or server failures.
    pub async fn connect(url: &str, collection: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::InvalidConfig(
                "vector dimension must be positive".to_string(),
            ));
        }

        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| RetrievalError::Qdrant(format!("client build: {e}")))?;

        let store = Self {
            client,
            collection: collection.into(),
            dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("collection_exists: {e}")))?;
        if exists {
            return Ok(());
        }

        info!(
            target: "rag_retrieval::qdrant",
            collection = %self.collection,
            dim = self.dimension,
            "creating collection"
        );
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("create_collection: {e}")))?;
        Ok(())
    }

    /// Stable numeric point id for a chunk id string.
    fn numeric_id(id: &str) -> u64 {
        let hash = blake3::hash(id.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn payload_for(id: &str, content: &str, metadata: &Metadata) -> Result<Payload> {
        json!({
            "id": id,
            "content": content,
            "metadata": metadata,
        })
        .try_into()
        .map_err(|e| RetrievalError::Qdrant(format!("payload convert: {e}")))
    }

    fn metadata_filter(filter: Option<&MetadataFilter>) -> Option<Filter> {
        let filter = filter?;
        if filter.is_empty() {
            return None;
        }
        let conditions: Vec<Condition> = filter
            .iter()
            .map(|(key, value)| {
                let field = format!("metadata.{key}");
                match value {
                    Value::String(s) => Condition::matches(field, s.clone()),
                    Value::Bool(b) => Condition::matches(field, *b),
                    Value::Number(n) if n.is_i64() => {
                        Condition::matches(field, n.as_i64().unwrap_or_default())
                    }
                    other => Condition::matches(field, other.to_string()),
                }
            })
            .collect();
        Some(Filter::must(conditions))
    }

    fn read_payload(payload: &HashMap<String, qdrant_client::qdrant::Value>) -> (String, String, Metadata) {
        let id = payload
            .get("id")
            .and_then(|v| v.clone().into_json().as_str().map(str::to_owned))
            .unwrap_or_default();
        let content = payload
            .get("content")
            .and_then(|v| v.clone().into_json().as_str().map(str::to_owned))
            .unwrap_or_default();
        let metadata = payload
            .get("metadata")
            .map(|v| v.clone().into_json())
            .and_then(|v| serde_json::from_value::<Metadata>(v).ok())
            .unwrap_or_default();
        (id, content, metadata)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn count(&self) -> Result<usize> {
        let resp = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("count: {e}")))?;
        Ok(resp.result.map(|r| r.count as usize).unwrap_or(0))
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
        if ids.is_empty() {
            return Ok(ids);
        }
        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); ids.len()]);

        let mut points = Vec::with_capacity(ids.len());
        for ((id, embedding), (content, metadata)) in ids
            .iter()
            .zip(embeddings)
            .zip(documents.iter().zip(metadatas.iter()))
        {
            if embedding.len() != self.dimension {
                return Err(RetrievalError::InvalidConfig(format!(
                    "vector length {} != dimension {} for id {}",
                    embedding.len(),
                    self.dimension,
                    id
                )));
            }
            let payload = Self::payload_for(id, content, metadata)?;
            points.push(PointStruct::new(Self::numeric_id(id), embedding, payload));
        }

        debug!(
            target: "rag_retrieval::qdrant",
            collection = %self.collection,
            points = points.len(),
            "upsert"
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("upsert_points: {e}")))?;
        Ok(ids)
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        if query_embedding.len() != self.dimension {
            return Err(RetrievalError::InvalidConfig(format!(
                "query vector length {} != dimension {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut builder = SearchPointsBuilder::new(
            &self.collection,
            query_embedding.to_vec(),
            n_results as u64,
        )
        .with_payload(true);
        if let Some(f) = Self::metadata_filter(filter) {
            builder = builder.filter(f);
        }

        let resp = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("search_points: {e}")))?;

        Ok(resp
            .result
            .into_iter()
            .map(|point| {
                let (id, content, metadata) = Self::read_payload(&point.payload);
                QueryResult {
                    id,
                    content,
                    metadata,
                    score: point.score,
                }
            })
            .collect())
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

        let scroll_limit = (n_results * 80).clamp(n_results, SCROLL_CAP);
        let mut builder = ScrollPointsBuilder::new(&self.collection)
            .limit(scroll_limit as u32)
            .with_payload(true);
        if let Some(f) = Self::metadata_filter(filter) {
            builder = builder.filter(f);
        }

        let resp = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("scroll: {e}")))?;

        let mut scored: Vec<QueryResult> = resp
            .result
            .into_iter()
            .filter_map(|point| {
                let (id, content, metadata) = Self::read_payload(&point.payload);
                let lower = content.to_lowercase();
                let matched = tokens.iter().filter(|t| lower.contains(*t)).count();
                if matched == 0 {
                    return None;
                }
                Some(QueryResult {
                    id,
                    content,
                    metadata,
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
        if ids.is_empty() {
            return Ok(());
        }
        let point_ids = ids
            .iter()
            .map(|id| Self::numeric_id(id).into())
            .collect::<Vec<_>>();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: point_ids }),
            )
            .await
            .map_err(|e| RetrievalError::Qdrant(format!("delete_points: {e}")))?;
        Ok(())
    }

    fn supports_hybrid(&self) -> bool {
        true
    }
}
