//! The question-answering pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use llm_router::{ChatMessage, ChatModel, TextStream};
use rag_retrieval::{
    MetadataFilter, PrerequisiteAwareRetriever, RetrievalResult, Retriever,
};
use tracing::{debug, info};

use crate::errors::pipeline_error::{PipelineError, Result};

/// Extra prerequisite chunks allowed past `n_retrieved_chunks`.
const EXTRA_PREREQ_SOURCES: usize = 4;
/// Conversation history window, in messages (5 Q&A pairs).
const HISTORY_WINDOW: usize = 10;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert calculus tutor helping high school students.

Your role:
- Provide clear, step-by-step explanations
- Use simple language while being mathematically precise
- Build on students' existing knowledge
- Identify when prerequisite concepts are needed
- Use relevant examples and visualizations when helpful

When answering:
1. ONLY answer the student's specific question - ignore any other problems or examples in the context
2. Use the provided context from the knowledge base as reference material
3. If prerequisite knowledge is needed, mention it
4. Keep answers focused and concise
5. Use LaTeX notation for math (e.g., $f(x)$, $$\\lim_{x \\to a}$$)

IMPORTANT: The context may contain multiple problems or examples. You must ONLY address the student's question, not other problems that appear in the context.

Remember: Your goal is to help students understand, not just provide answers.";

/// Generated answer plus the evidence behind it.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    /// Chunks the answer was grounded on.
    pub sources: Vec<RetrievalResult>,
    /// Unique source topics, when prerequisite detection was requested.
    pub prerequisites_detected: Option<Vec<String>>,
    pub detected_topic: Option<String>,
    pub prerequisites_used: Option<Vec<String>>,
    pub confidence: Option<f32>,
}

/// Per-query knobs for [`RagPipeline::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filters: Option<MetadataFilter>,
    /// Generation temperature; `None` means 0.7.
    pub temperature: Option<f32>,
    /// Report unique source topics in `prerequisites_detected`.
    pub detect_prerequisites: bool,
    /// Prior conversation turns; only the last ten are used.
    pub history: Vec<ChatMessage>,
}

/// Retrieval-augmented question answering.
pub struct RagPipeline {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
    system_prompt: String,
    n_retrieved_chunks: usize,
    n_prerequisite_results: usize,
    prerequisite_retriever: Option<PrerequisiteAwareRetriever>,
    use_prerequisite_retrieval: bool,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, llm: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            llm,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            n_retrieved_chunks: 5,
            n_prerequisite_results: 2,
            prerequisite_retriever: None,
            use_prerequisite_retrieval: true,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_n_retrieved_chunks(mut self, n: usize) -> Self {
        self.n_retrieved_chunks = n;
        self
    }

    /// Chunks fetched per prerequisite topic; defaults to 2.
    pub fn with_n_prerequisite_results(mut self, n: usize) -> Self {
        self.n_prerequisite_results = n;
        self
    }

    pub fn with_prerequisite_retriever(mut self, retriever: PrerequisiteAwareRetriever) -> Self {
        self.prerequisite_retriever = Some(retriever);
        self
    }

    pub fn with_prerequisite_retrieval(mut self, enabled: bool) -> Self {
        self.use_prerequisite_retrieval = enabled;
        self
    }

    /// Answer a question with retrieval-augmented generation.
    ///
    /// Uses prerequisite-aware retrieval when configured and enabled,
    /// otherwise plain semantic retrieval.
    ///
    /// # Errors
    /// [`PipelineError::EmptyQuestion`] for blank input; retrieval and
    /// generation failures are passed through.
    pub async fn query(&self, question: &str, options: QueryOptions) -> Result<RagResponse> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let temperature = options.temperature.unwrap_or(0.7);

        let mut detected_topic = None;
        let mut prerequisites_used = None;

        let sources = match (&self.prerequisite_retriever, self.use_prerequisite_retrieval) {
            (Some(prereq), true) => {
                let result = prereq
                    .retrieve(
                        question,
                        self.n_retrieved_chunks,
                        self.n_prerequisite_results,
                        options.filters.as_ref(),
                        true,
                    )
                    .await?;
                detected_topic = result.detected_topic;
                prerequisites_used = Some(result.prerequisites_used);

                // Allow a few extra prerequisite chunks past the cap.
                let mut sources = result.results;
                sources.truncate(self.n_retrieved_chunks + EXTRA_PREREQ_SOURCES);
                sources
            }
            _ => {
                self.retriever
                    .retrieve(
                        question,
                        self.n_retrieved_chunks,
                        options.filters.as_ref(),
                        None,
                    )
                    .await?
            }
        };

        let context = build_context(&sources);
        let messages = self.build_messages(question, &context, &options.history);

        debug!(
            target: "rag_pipeline",
            sources = sources.len(),
            topic = detected_topic.as_deref().unwrap_or("-"),
            "generating answer"
        );
        let llm_response = self.llm.generate(&messages, temperature, None).await?;

        let prerequisites_detected = options
            .detect_prerequisites
            .then(|| source_topics(&sources));

        info!(
            target: "rag_pipeline",
            model = %self.llm.model_name(),
            answer_chars = llm_response.content.len(),
            "answer generated"
        );

        Ok(RagResponse {
            answer: llm_response.content,
            sources,
            prerequisites_detected,
            detected_topic,
            prerequisites_used,
            confidence: None,
        })
    }

    /// Stream an answer token by token.
    ///
    /// Streaming always uses plain semantic retrieval and carries no
    /// conversation history.
    pub async fn query_stream(
        &self,
        question: &str,
        filters: Option<&MetadataFilter>,
        temperature: f32,
    ) -> Result<TextStream> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let sources = self
            .retriever
            .retrieve(question, self.n_retrieved_chunks, filters, None)
            .await?;

        let context = build_context(&sources);
        let messages = self.build_messages(question, &context, &[]);

        Ok(self.llm.generate_stream(&messages, temperature, None).await?)
    }

    fn build_messages(
        &self,
        question: &str,
        context: &str,
        history: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];

        let start = history.len().saturating_sub(HISTORY_WINDOW);
        messages.extend_from_slice(&history[start..]);

        messages.push(ChatMessage::user(build_user_prompt(question, context)));
        messages
    }
}

fn build_context(sources: &[RetrievalResult]) -> String {
    if sources.is_empty() {
        return "No relevant content found in the knowledge base.".to_string();
    }

    let parts: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let topic = source
                .metadata
                .get("topic")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let difficulty = source
                .metadata
                .get("difficulty")
                .and_then(|v| v.as_u64())
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".to_string());
            let source_type = if source
                .metadata
                .get("is_prerequisite")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                "Prerequisite"
            } else {
                "Main"
            };
            format!(
                "[Source {} - {} - Topic: {}, Difficulty: {}]\n{}\n",
                i + 1,
                source_type,
                topic,
                difficulty,
                source.content
            )
        })
        .collect();

    parts.join("\n")
}

fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Context from knowledge base:\n{context}\n\nStudent Question: {question}\n\n\
         Please provide a clear, helpful answer based on the context above. \
         If the context doesn't contain enough information, acknowledge this \
         and provide what guidance you can."
    )
}

/// Unique topics across sources, sorted.
fn source_topics(sources: &[RetrievalResult]) -> Vec<String> {
    let topics: BTreeSet<String> = sources
        .iter()
        .filter_map(|s| s.metadata.get("topic").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect();
    topics.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt;
    use llm_router::{LlmError, LlmResponse};
    use rag_retrieval::{
        Embedder, MemoryVectorStore, Metadata, PrereqRetrieverOptions, RetrievalError, VectorStore,
    };
    use serde_json::json;
    use std::sync::Mutex;

    use super::*;

    /// Chat model that records the messages it was given and echoes a
    /// canned answer.
    struct ScriptedModel {
        answer: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            let seen = self.seen.lock().unwrap();
            let messages = seen.last().expect("model was called");
            messages.last().expect("user message").content.clone()
        }

        fn last_message_count(&self) -> usize {
            let seen = self.seen.lock().unwrap();
            seen.last().expect("model was called").len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> String {
            "scripted".to_string()
        }

        async fn generate(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<LlmResponse, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(LlmResponse::new(self.answer.clone()))
        }

        async fn generate_stream(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<TextStream, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let chunks: Vec<std::result::Result<String, LlmError>> = self
                .answer
                .split_whitespace()
                .map(|w| Ok(format!("{w} ")))
                .collect();
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, RetrievalError> {
            let lower = text.to_lowercase();
            Ok(vec![
                if lower.contains("chain") { 1.0 } else { 0.0 },
                if lower.contains("composition") || lower.contains("composite") {
                    1.0
                } else {
                    0.0
                },
            ])
        }
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let embedder = AxisEmbedder;
        let store = MemoryVectorStore::new();
        let documents = vec![
            "The chain rule differentiates composite functions".to_string(),
            "Function composition applies one function to another".to_string(),
        ];
        let mut embeddings = Vec::new();
        for doc in &documents {
            embeddings.push(embedder.embed(doc).await.unwrap());
        }
        let metadatas: Vec<Metadata> = vec![
            [
                ("topic".to_string(), json!("derivatives.chain_rule")),
                ("difficulty".to_string(), json!(3)),
            ]
            .into(),
            [("topic".to_string(), json!("functions.composition"))].into(),
        ];
        store
            .add(
                vec!["chain-1".into(), "comp-1".into()],
                embeddings,
                documents,
                Some(metadatas),
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    async fn pipeline_with(model: Arc<ScriptedModel>) -> RagPipeline {
        let embedder: Arc<dyn Embedder> = Arc::new(AxisEmbedder);
        let store: Arc<dyn VectorStore> = seeded_store().await;
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));
        let prereq = PrerequisiteAwareRetriever::new(
            embedder,
            store,
            None,
            PrereqRetrieverOptions::default(),
        )
        .unwrap();
        RagPipeline::new(retriever, model).with_prerequisite_retriever(prereq)
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let model = Arc::new(ScriptedModel::new("answer"));
        let pipeline = pipeline_with(Arc::clone(&model)).await;
        assert!(matches!(
            pipeline.query("  ", QueryOptions::default()).await,
            Err(PipelineError::EmptyQuestion)
        ));
    }

    #[tokio::test]
    async fn answer_carries_sources_and_topic() {
        let model = Arc::new(ScriptedModel::new("The chain rule says..."));
        let pipeline = pipeline_with(Arc::clone(&model)).await;

        let response = pipeline
            .query("Explain the chain rule", QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(response.answer, "The chain rule says...");
        assert!(!response.sources.is_empty());
        assert_eq!(
            response.detected_topic.as_deref(),
            Some("derivatives.chain_rule")
        );
        assert!(
            response
                .prerequisites_used
                .as_ref()
                .is_some_and(|p| p.contains(&"functions.composition".to_string()))
        );
    }

    #[tokio::test]
    async fn prompt_labels_main_and_prerequisite_sources() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let pipeline = pipeline_with(Arc::clone(&model)).await;

        pipeline
            .query("Explain the chain rule", QueryOptions::default())
            .await
            .unwrap();

        let prompt = model.last_prompt();
        assert!(prompt.contains("Context from knowledge base:"));
        assert!(prompt.contains("[Source 1 - Main - Topic: derivatives.chain_rule, Difficulty: 3]"));
        assert!(prompt.contains("- Prerequisite - Topic: functions.composition, Difficulty: ?]"));
        assert!(prompt.contains("Student Question: Explain the chain rule"));
    }

    #[tokio::test]
    async fn history_is_windowed_to_last_ten_messages() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let pipeline = pipeline_with(Arc::clone(&model)).await;

        let history: Vec<ChatMessage> = (0..14)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect();

        pipeline
            .query(
                "Explain the chain rule",
                QueryOptions {
                    history,
                    ..QueryOptions::default()
                },
            )
            .await
            .unwrap();

        // system + 10 history + user question
        assert_eq!(model.last_message_count(), 12);
    }

    #[tokio::test]
    async fn prerequisite_chunk_budget_is_configurable() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let pipeline = pipeline_with(Arc::clone(&model))
            .await
            .with_n_prerequisite_results(0);

        let response = pipeline
            .query("Explain the chain rule", QueryOptions::default())
            .await
            .unwrap();

        // Zero budget: the prerequisite pass fetches nothing, main
        // results still come through.
        assert!(response.sources.iter().any(|s| s.chunk_id == "chain-1"));
        assert!(
            response
                .sources
                .iter()
                .all(|s| s.metadata.get("is_prerequisite").is_none())
        );
    }

    #[tokio::test]
    async fn detect_prerequisites_reports_source_topics() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let pipeline = pipeline_with(Arc::clone(&model)).await;

        let response = pipeline
            .query(
                "Explain the chain rule",
                QueryOptions {
                    detect_prerequisites: true,
                    ..QueryOptions::default()
                },
            )
            .await
            .unwrap();

        let detected = response.prerequisites_detected.unwrap();
        assert!(detected.contains(&"derivatives.chain_rule".to_string()));
        assert!(detected.is_sorted());
    }

    #[tokio::test]
    async fn query_stream_yields_answer_chunks() {
        let model = Arc::new(ScriptedModel::new("step by step"));
        let pipeline = pipeline_with(Arc::clone(&model)).await;

        let mut stream = pipeline
            .query_stream("Explain the chain rule", None, 0.7)
            .await
            .unwrap();

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            answer.push_str(&chunk.unwrap());
        }
        assert_eq!(answer.trim(), "step by step");
    }

    #[tokio::test]
    async fn empty_store_yields_no_content_notice() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let embedder: Arc<dyn Embedder> = Arc::new(AxisEmbedder);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let pipeline = RagPipeline::new(
            Retriever::new(Arc::clone(&embedder), store),
            Arc::clone(&model) as Arc<dyn ChatModel>,
        );

        pipeline
            .query("Explain the chain rule", QueryOptions::default())
            .await
            .unwrap();
        assert!(
            model
                .last_prompt()
                .contains("No relevant content found in the knowledge base.")
        );
    }
}
