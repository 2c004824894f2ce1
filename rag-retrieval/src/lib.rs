//! Retrieval layer: embeddings, vector stores, and retrievers.
//!
//! - [`store::VectorStore`] — async store contract with RRF hybrid search
//! - [`embedder`] — `Embedder` trait + Ollama client
//! - [`memory::MemoryVectorStore`] — in-process store for tests and demos
//! - [`qdrant_store::QdrantVectorStore`] — production Qdrant backend
//! - [`retriever`] / [`hybrid`] / [`prereq`] — semantic, hybrid, and
//!   prerequisite-aware retrieval over any store

pub mod config;
pub mod embedder;
pub mod errors;
pub mod fusion;
pub mod hybrid;
pub mod memory;
pub mod prereq;
pub mod qdrant_store;
pub mod retriever;
pub mod store;
pub mod text_cleanup;

pub use config::RetrievalConfig;
pub use embedder::{Embedder, OllamaEmbedder};
pub use errors::retrieval_error::RetrievalError;
pub use hybrid::{HybridRetrievalResult, HybridRetriever, MethodComparison};
pub use memory::MemoryVectorStore;
pub use prereq::{PrereqRetrieverOptions, PrerequisiteAwareResult, PrerequisiteAwareRetriever};
pub use qdrant_store::QdrantVectorStore;
pub use retriever::{RetrievalResult, Retriever};
pub use store::{Metadata, MetadataFilter, QueryResult, VectorStore};
