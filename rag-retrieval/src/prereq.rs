//! Prerequisite-aware retrieval.
//!
//! Detects which topic a question is about, then fetches supporting
//! chunks from that topic's prerequisites alongside the main results,
//! so answers can lean on foundational material the student may be
//! missing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use curriculum::{GapDetector, PrerequisiteGraph, topic_info};
use serde_json::json;
use tracing::debug;

use crate::embedder::Embedder;
use crate::errors::retrieval_error::{RetrievalError, Result};
use crate::retriever::{RetrievalResult, Retriever};
use crate::store::{MetadataFilter, VectorStore};
use crate::text_cleanup::{cleanup_math_text, is_chunk_corrupted};

/// Default relevance floor; chunks scoring below it are dropped before
/// they reach the prompt.
pub const MIN_RELEVANCE_SCORE: f32 = 0.45;

/// Hybrid-search chunks exceeding this corruption ratio are discarded
/// rather than repaired.
const CORRUPTION_THRESHOLD: f32 = 0.3;

/// Tuning knobs for [`PrerequisiteAwareRetriever`].
#[derive(Debug, Clone)]
pub struct PrereqRetrieverOptions {
    /// Prerequisite levels to walk; 1 means direct prerequisites only.
    pub max_prerequisite_depth: usize,
    /// Score multiplier for prerequisite chunks; main chunks keep full score.
    pub prerequisite_weight: f32,
    /// Prefer hybrid search when the store supports it.
    pub use_hybrid_search: bool,
    /// Semantic share of hybrid fusion.
    pub semantic_weight: f32,
    /// Relevance floor for main results.
    pub min_relevance_score: f32,
}

impl Default for PrereqRetrieverOptions {
    fn default() -> Self {
        Self {
            max_prerequisite_depth: 2,
            prerequisite_weight: 0.8,
            use_hybrid_search: true,
            semantic_weight: 0.7,
            min_relevance_score: MIN_RELEVANCE_SCORE,
        }
    }
}

/// Result of a prerequisite-aware retrieval.
#[derive(Debug, Clone)]
pub struct PrerequisiteAwareResult {
    /// Main and prerequisite chunks, deduplicated, sorted by score.
    pub results: Vec<RetrievalResult>,
    pub detected_topic: Option<String>,
    /// Prerequisite topics that were actually searched.
    pub prerequisites_used: Vec<String>,
    pub main_results_count: usize,
    pub prerequisite_results_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStrategy {
    Hybrid,
    Semantic,
}

/// Retriever combining main-topic and prerequisite-topic content.
pub struct PrerequisiteAwareRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    base: Retriever,
    graph: PrerequisiteGraph,
    detector: GapDetector,
    options: PrereqRetrieverOptions,
    strategy: SearchStrategy,
}

impl PrerequisiteAwareRetriever {
    /// Builds the retriever. The search strategy is fixed here: hybrid
    /// if requested and the store supports it, semantic otherwise.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        graph: Option<PrerequisiteGraph>,
        options: PrereqRetrieverOptions,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&options.prerequisite_weight) {
            return Err(RetrievalError::InvalidConfig(format!(
                "prerequisite_weight {} out of [0, 1]",
                options.prerequisite_weight
            )));
        }
        if !(0.0..=1.0).contains(&options.semantic_weight) {
            return Err(RetrievalError::InvalidConfig(format!(
                "semantic_weight {} out of [0, 1]",
                options.semantic_weight
            )));
        }
        if !(0.0..=1.0).contains(&options.min_relevance_score) {
            return Err(RetrievalError::InvalidConfig(format!(
                "min_relevance_score {} out of [0, 1]",
                options.min_relevance_score
            )));
        }

        let graph = match graph {
            Some(graph) => graph,
            None => curriculum::build_prerequisite_graph()?,
        };
        let strategy = if options.use_hybrid_search && store.supports_hybrid() {
            SearchStrategy::Hybrid
        } else {
            SearchStrategy::Semantic
        };
        let base = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));

        Ok(Self {
            embedder,
            store,
            base,
            detector: GapDetector::new(graph.clone()),
            graph,
            options,
            strategy,
        })
    }

    pub fn detected_topic_for(&self, query: &str) -> Option<String> {
        self.detector.analyze_query(query)
    }

    /// Prerequisites of `topic` up to `depth` levels, first-seen order,
    /// without duplicates.
    fn limited_prerequisites(&self, topic: &str, depth: usize) -> Vec<String> {
        let mut ordered = Vec::new();
        let mut seen = BTreeSet::new();
        let mut frontier = vec![topic.to_string()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in frontier {
                for prereq in self.graph.prerequisites(&current) {
                    if seen.insert(prereq.clone()) {
                        ordered.push(prereq.clone());
                        next.push(prereq.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        ordered
    }

    async fn main_results(
        &self,
        query: &str,
        n_results: usize,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        match self.strategy {
            SearchStrategy::Hybrid => {
                let query_embedding = self.embedder.embed(query).await?;
                // Over-fetch to leave room for the relevance filter.
                let hits = self
                    .store
                    .hybrid_search(
                        query,
                        &query_embedding,
                        n_results * 2,
                        self.options.semantic_weight,
                        filters,
                    )
                    .await?;
                let mut results: Vec<RetrievalResult> = hits
                    .into_iter()
                    .filter(|hit| hit.score >= self.options.min_relevance_score)
                    .filter(|hit| !is_chunk_corrupted(&hit.content, CORRUPTION_THRESHOLD))
                    .map(|hit| RetrievalResult {
                        content: cleanup_math_text(&hit.content),
                        score: hit.score,
                        metadata: hit.metadata,
                        chunk_id: hit.id,
                    })
                    .collect();
                results.truncate(n_results);
                Ok(results)
            }
            SearchStrategy::Semantic => {
                self.base
                    .retrieve(
                        query,
                        n_results,
                        filters,
                        Some(self.options.min_relevance_score),
                    )
                    .await
            }
        }
    }

    /// Retrieve main-topic chunks plus prerequisite chunks.
    ///
    /// Prerequisite chunks are searched as `"{display name}: {query}"`
    /// within their own topic, down-weighted by `prerequisite_weight`,
    /// and tagged with `is_prerequisite` / `prerequisite_for` metadata.
    ///
    /// # Errors
    /// [`RetrievalError::EmptyQuery`] for blank queries.
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        n_prerequisite_results: usize,
        filters: Option<&MetadataFilter>,
        include_prerequisites: bool,
    ) -> Result<PrerequisiteAwareResult> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let detected_topic = self.detector.analyze_query(query);
        let main_results = self.main_results(query, n_results, filters).await?;

        let mut prerequisites_used = Vec::new();
        let mut prerequisite_results: Vec<RetrievalResult> = Vec::new();

        if include_prerequisites {
            if let Some(topic) = detected_topic.as_deref() {
                let prerequisites =
                    self.limited_prerequisites(topic, self.options.max_prerequisite_depth);

                for prereq_topic in prerequisites {
                    let Some(info) = topic_info(&prereq_topic) else {
                        continue;
                    };
                    prerequisites_used.push(prereq_topic.clone());

                    // Topic name plus query focuses the search.
                    let prereq_query = format!("{}: {}", info.display_name, query);
                    let mut prereq_filter: MetadataFilter =
                        filters.cloned().unwrap_or_default();
                    prereq_filter.insert("topic".to_string(), json!(prereq_topic));

                    let mut hits = self
                        .base
                        .retrieve(
                            &prereq_query,
                            n_prerequisite_results,
                            Some(&prereq_filter),
                            None,
                        )
                        .await?;

                    for hit in &mut hits {
                        hit.score *= self.options.prerequisite_weight;
                        hit.metadata
                            .insert("is_prerequisite".to_string(), json!(true));
                        hit.metadata
                            .insert("prerequisite_for".to_string(), json!(topic));
                    }
                    prerequisite_results.extend(hits);
                }
            }
        }

        let main_results_count = main_results.len();
        let prerequisite_results_count = prerequisite_results.len();

        // Dedup by chunk id, keeping the higher score.
        let mut by_id: HashMap<String, RetrievalResult> = HashMap::new();
        for result in main_results.into_iter().chain(prerequisite_results) {
            match by_id.get(&result.chunk_id) {
                Some(existing) if existing.score >= result.score => {}
                _ => {
                    by_id.insert(result.chunk_id.clone(), result);
                }
            }
        }
        let mut results: Vec<RetrievalResult> = by_id.into_values().collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        debug!(
            target: "rag_retrieval::prereq",
            topic = detected_topic.as_deref().unwrap_or("-"),
            main = main_results_count,
            prereq = prerequisite_results_count,
            "prerequisite-aware retrieval"
        );

        Ok(PrerequisiteAwareResult {
            results,
            detected_topic,
            prerequisites_used,
            main_results_count,
            prerequisite_results_count,
        })
    }

    /// Retrieve and also suggest a learning path toward the detected
    /// topic, skipping `completed_topics`.
    pub async fn retrieve_with_learning_path(
        &self,
        query: &str,
        completed_topics: &BTreeSet<String>,
        n_results: usize,
        n_prerequisite_results: usize,
    ) -> Result<(PrerequisiteAwareResult, Vec<String>)> {
        let result = self
            .retrieve(query, n_results, n_prerequisite_results, None, true)
            .await?;

        let learning_path = match result.detected_topic.as_deref() {
            Some(topic) => self.graph.learning_path(topic, completed_topics),
            None => Vec::new(),
        };
        Ok((result, learning_path))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::memory::MemoryVectorStore;
    use crate::store::{Metadata, QueryResult};

    /// Embedder keyed on topic vocabulary so chunks land on separate axes.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(vec![
                if lower.contains("chain") { 1.0 } else { 0.0 },
                if lower.contains("composition") || lower.contains("composite") {
                    1.0
                } else {
                    0.0
                },
                if lower.contains("derivative") { 1.0 } else { 0.0 },
            ])
        }
    }

    fn meta(topic: &str) -> Metadata {
        [("topic".to_string(), json!(topic))].into()
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let embedder = AxisEmbedder;
        let store = MemoryVectorStore::new();
        let documents = vec![
            "The chain rule differentiates composite functions".to_string(),
            "Function composition means applying one function to another".to_string(),
            "The derivative measures instantaneous rate of change".to_string(),
        ];
        let mut embeddings = Vec::new();
        for doc in &documents {
            embeddings.push(embedder.embed(doc).await.unwrap());
        }
        store
            .add(
                vec!["chain-1".into(), "comp-1".into(), "deriv-1".into()],
                embeddings,
                documents,
                Some(vec![
                    meta("derivatives.chain_rule"),
                    meta("functions.composition"),
                    meta("derivatives.basic"),
                ]),
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    async fn retriever(options: PrereqRetrieverOptions) -> PrerequisiteAwareRetriever {
        PrerequisiteAwareRetriever::new(Arc::new(AxisEmbedder), seeded_store().await, None, options)
            .unwrap()
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let r = retriever(PrereqRetrieverOptions::default()).await;
        assert!(matches!(
            r.retrieve(" ", 5, 2, None, true).await,
            Err(RetrievalError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn detects_topic_and_pulls_prerequisite_chunks() {
        let r = retriever(PrereqRetrieverOptions::default()).await;
        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, true)
            .await
            .unwrap();

        assert_eq!(result.detected_topic.as_deref(), Some("derivatives.chain_rule"));
        assert!(
            result
                .prerequisites_used
                .iter()
                .any(|t| t == "functions.composition")
        );

        let prereq_chunk = result
            .results
            .iter()
            .find(|r| r.chunk_id == "comp-1")
            .expect("prerequisite chunk present");
        assert_eq!(prereq_chunk.metadata.get("is_prerequisite"), Some(&json!(true)));
        assert_eq!(
            prereq_chunk.metadata.get("prerequisite_for"),
            Some(&json!("derivatives.chain_rule"))
        );
    }

    #[tokio::test]
    async fn prerequisite_scores_are_down_weighted() {
        let r = retriever(PrereqRetrieverOptions::default()).await;
        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, true)
            .await
            .unwrap();

        let main = result.results.iter().find(|r| r.chunk_id == "chain-1");
        let prereq = result.results.iter().find(|r| r.chunk_id == "comp-1");
        if let (Some(main), Some(prereq)) = (main, prereq) {
            assert!(main.score > prereq.score);
            // comp-1 scores 1/sqrt(2) against the augmented query and is
            // then multiplied by the 0.8 prerequisite weight.
            let expected = std::f32::consts::FRAC_1_SQRT_2 * 0.8;
            assert!((prereq.score - expected).abs() < 1e-5);
        } else {
            panic!("expected both main and prerequisite chunks");
        }
    }

    #[tokio::test]
    async fn duplicate_chunk_across_passes_keeps_single_higher_score() {
        let embedder = AxisEmbedder;
        let store = MemoryVectorStore::new();
        // "both-1" is relevant to the main query AND lives in the
        // prerequisite topic, so it surfaces in both passes.
        let documents = vec![
            "The chain rule differentiates composite functions".to_string(),
            "The chain rule uses function composition".to_string(),
        ];
        let mut embeddings = Vec::new();
        for doc in &documents {
            embeddings.push(embedder.embed(doc).await.unwrap());
        }
        store
            .add(
                vec!["chain-1".into(), "both-1".into()],
                embeddings,
                documents,
                Some(vec![
                    meta("derivatives.chain_rule"),
                    meta("functions.composition"),
                ]),
            )
            .await
            .unwrap();

        let r = PrerequisiteAwareRetriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(store),
            None,
            PrereqRetrieverOptions::default(),
        )
        .unwrap();

        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, true)
            .await
            .unwrap();

        let copies: Vec<_> = result
            .results
            .iter()
            .filter(|r| r.chunk_id == "both-1")
            .collect();
        assert_eq!(copies.len(), 1);

        // Main pass scores it 1/sqrt(2); the prerequisite pass scores it
        // 1.0 * 0.8 = 0.8. The higher copy survives, tags included.
        let survivor = copies[0];
        assert!((survivor.score - 0.8).abs() < 1e-5);
        assert_eq!(survivor.metadata.get("is_prerequisite"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn relevance_floor_is_configurable() {
        let r = retriever(PrereqRetrieverOptions {
            min_relevance_score: 0.9,
            ..PrereqRetrieverOptions::default()
        })
        .await;
        // chain-1 scores 1/sqrt(2), below the raised floor.
        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, false)
            .await
            .unwrap();
        assert!(result.results.is_empty());

        let out_of_range = PrerequisiteAwareRetriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(MemoryVectorStore::new()),
            None,
            PrereqRetrieverOptions {
                min_relevance_score: 1.5,
                ..PrereqRetrieverOptions::default()
            },
        );
        assert!(out_of_range.is_err());
    }

    /// In-memory store that opts into hybrid search, exercising the
    /// RRF path that plain [`MemoryVectorStore`] never takes.
    struct HybridMemoryStore(MemoryVectorStore);

    #[async_trait]
    impl VectorStore for HybridMemoryStore {
        async fn count(&self) -> Result<usize> {
            self.0.count().await
        }

        async fn add(
            &self,
            ids: Vec<String>,
            embeddings: Vec<Vec<f32>>,
            documents: Vec<String>,
            metadatas: Option<Vec<Metadata>>,
        ) -> Result<Vec<String>> {
            self.0.add(ids, embeddings, documents, metadatas).await
        }

        async fn query(
            &self,
            query_embedding: &[f32],
            n_results: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<QueryResult>> {
            self.0.query(query_embedding, n_results, filter).await
        }

        async fn fulltext_search(
            &self,
            query_text: &str,
            n_results: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<QueryResult>> {
            self.0.fulltext_search(query_text, n_results, filter).await
        }

        async fn delete(&self, ids: &[String]) -> Result<()> {
            self.0.delete(ids).await
        }

        fn supports_hybrid(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn corrupted_chunks_are_dropped_from_hybrid_results() {
        let embedder = AxisEmbedder;
        let store = HybridMemoryStore(MemoryVectorStore::new());
        let documents = vec![
            "The chain rule differentiates composite functions".to_string(),
            // Bracket fragments from a botched PDF extraction.
            "⎡ ⎤ ⎣ ⎦ ⎧ ⎨ chain rule ⎫".to_string(),
        ];
        let mut embeddings = Vec::new();
        for doc in &documents {
            embeddings.push(embedder.embed(doc).await.unwrap());
        }
        store
            .add(
                vec!["clean-1".into(), "bad-1".into()],
                embeddings,
                documents,
                Some(vec![
                    meta("derivatives.chain_rule"),
                    meta("derivatives.chain_rule"),
                ]),
            )
            .await
            .unwrap();

        // Zero floor so the small fused RRF scores pass the relevance
        // filter and only the corruption check can drop a chunk.
        let r = PrerequisiteAwareRetriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(store),
            None,
            PrereqRetrieverOptions {
                min_relevance_score: 0.0,
                ..PrereqRetrieverOptions::default()
            },
        )
        .unwrap();
        assert_eq!(r.strategy, SearchStrategy::Hybrid);

        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, false)
            .await
            .unwrap();
        assert!(result.results.iter().any(|r| r.chunk_id == "clean-1"));
        assert!(result.results.iter().all(|r| r.chunk_id != "bad-1"));
    }

    #[tokio::test]
    async fn prerequisites_can_be_disabled() {
        let r = retriever(PrereqRetrieverOptions::default()).await;
        let result = r
            .retrieve("Explain the chain rule", 3, 2, None, false)
            .await
            .unwrap();
        assert!(result.prerequisites_used.is_empty());
        assert_eq!(result.prerequisite_results_count, 0);
    }

    #[tokio::test]
    async fn falls_back_to_semantic_when_store_lacks_hybrid() {
        // MemoryVectorStore reports supports_hybrid() == false, so the
        // strategy must be semantic even with use_hybrid_search = true.
        let r = retriever(PrereqRetrieverOptions::default()).await;
        assert_eq!(r.strategy, SearchStrategy::Semantic);
    }

    #[tokio::test]
    async fn low_relevance_chunks_are_dropped() {
        let r = retriever(PrereqRetrieverOptions {
            max_prerequisite_depth: 0,
            ..PrereqRetrieverOptions::default()
        })
        .await;
        // Nothing in the store mentions integrals; all cosine scores are
        // below the relevance floor.
        let result = r
            .retrieve("integral of sin", 3, 2, None, false)
            .await
            .unwrap();
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn learning_path_targets_detected_topic() {
        let r = retriever(PrereqRetrieverOptions::default()).await;
        let completed: BTreeSet<String> = BTreeSet::new();
        let (result, path) = r
            .retrieve_with_learning_path("Explain the chain rule", &completed, 3, 2)
            .await
            .unwrap();
        assert_eq!(result.detected_topic.as_deref(), Some("derivatives.chain_rule"));
        assert_eq!(path.last().map(String::as_str), Some("derivatives.chain_rule"));
        assert!(path.contains(&"functions.composition".to_string()));
    }

    #[test]
    fn limited_prerequisites_respect_depth() {
        let graph = curriculum::build_prerequisite_graph().unwrap();
        let r = PrerequisiteAwareRetriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Some(graph),
            PrereqRetrieverOptions::default(),
        )
        .unwrap();

        let depth1 = r.limited_prerequisites("derivatives.chain_rule", 1);
        assert!(depth1.contains(&"derivatives.basic".to_string()));
        assert!(depth1.contains(&"functions.composition".to_string()));
        assert!(!depth1.contains(&"limits.introduction".to_string()));

        let depth2 = r.limited_prerequisites("derivatives.chain_rule", 2);
        assert!(depth2.contains(&"derivatives.definition".to_string()));
        assert!(r.limited_prerequisites("derivatives.chain_rule", 0).is_empty());
    }
}
