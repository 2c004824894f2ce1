//! Command-line entry point: answer one calculus question.
//!
//! Wiring is environment-driven. With `QDRANT_URL` set the real vector
//! store is used; otherwise an empty in-memory store stands in, which
//! still exercises the full pipeline. `CLOUD_LLM_ENABLED=true` adds a
//! cloud fallback model behind the router.

use std::env;
use std::error::Error;
use std::sync::Arc;

use llm_router::{ChatModel, CloudChat, CloudProvider, ComplexityLevel, ModelRouter, OllamaChat};
use rag_pipeline::{QueryOptions, RagPipeline};
use rag_retrieval::{
    Embedder, MemoryVectorStore, OllamaEmbedder, PrereqRetrieverOptions,
    PrerequisiteAwareRetriever, QdrantVectorStore, RetrievalConfig, Retriever, VectorStore,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

async fn build_store(config: &RetrievalConfig) -> Result<Arc<dyn VectorStore>, Box<dyn Error>> {
    match &config.qdrant_url {
        Some(url) => {
            info!(url = %url, collection = %config.collection, "using Qdrant vector store");
            let store =
                QdrantVectorStore::connect(url, &config.collection, config.embedding_dimension)
                    .await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("QDRANT_URL not set, using an empty in-memory vector store");
            Ok(Arc::new(MemoryVectorStore::new()))
        }
    }
}

fn build_router(config: &RetrievalConfig) -> Result<ModelRouter, Box<dyn Error>> {
    let ollama_model = env_or("OLLAMA_MODEL", "qwen2.5-math:7b");
    let ollama_timeout = env_secs("OLLAMA_REQUEST_TIMEOUT", 120);
    let ollama_api_key = env::var("OLLAMA_API_KEY").ok().filter(|v| !v.is_empty());

    let primary = OllamaChat::new(
        &ollama_model,
        &config.ollama_url,
        ollama_timeout,
        ollama_api_key,
    )?;

    let cloud_enabled = env_or("CLOUD_LLM_ENABLED", "false")
        .trim()
        .eq_ignore_ascii_case("true");
    let mut router = ModelRouter::new(cloud_enabled);
    router.add_model(
        Arc::new(primary),
        format!("Ollama-{ollama_model}"),
        ComplexityLevel::Moderate,
        false,
    );

    if cloud_enabled {
        let provider = CloudProvider::parse(&env_or("CLOUD_LLM_PROVIDER", "openrouter"))?;
        let cloud_model = env_or("CLOUD_LLM_MODEL", "deepseek/deepseek-chat");
        let cloud = CloudChat::new(
            env_or("CLOUD_LLM_API_KEY", ""),
            &cloud_model,
            provider,
            env_secs("CLOUD_LLM_TIMEOUT", 180),
            None,
        )?;
        let name = cloud.model_name();
        router.add_model(Arc::new(cloud), name, ComplexityLevel::Complex, true);
        info!(model = %cloud_model, "cloud fallback enabled");
    }

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let question: String = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        eprintln!("usage: calculus-tutor <question>");
        std::process::exit(2);
    }

    let config = RetrievalConfig::from_env()?;

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
        &config.embedding_model,
        &config.ollama_url,
        config.embedding_dimension,
        config.embedding_max_tokens,
        config.embedding_timeout_secs,
    )?);
    let store = build_store(&config).await?;

    let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));
    let prereq_retriever = PrerequisiteAwareRetriever::new(
        Arc::clone(&embedder),
        Arc::clone(&store),
        None,
        PrereqRetrieverOptions {
            max_prerequisite_depth: config.prerequisite_depth,
            prerequisite_weight: config.prerequisite_weight,
            use_hybrid_search: config.use_hybrid_search,
            semantic_weight: config.semantic_weight,
            min_relevance_score: config.min_relevance_score,
        },
    )?;

    let router = build_router(&config)?;
    let pipeline = RagPipeline::new(retriever, Arc::new(router))
        .with_n_retrieved_chunks(config.top_k)
        .with_n_prerequisite_results(config.n_prerequisite_results)
        .with_prerequisite_retriever(prereq_retriever);

    let response = pipeline.query(&question, QueryOptions::default()).await?;

    println!("{}\n", response.answer);
    if let Some(topic) = &response.detected_topic {
        println!("Detected topic: {topic}");
    }
    if let Some(prereqs) = response.prerequisites_used.as_deref().filter(|p| !p.is_empty()) {
        println!("Prerequisites searched: {}", prereqs.join(", "));
    }
    if !response.sources.is_empty() {
        println!("Sources:");
        for source in &response.sources {
            let topic = source
                .metadata
                .get("topic")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            println!("  {:.2}  {}  ({})", source.score, source.chunk_id, topic);
        }
    }

    Ok(())
}
