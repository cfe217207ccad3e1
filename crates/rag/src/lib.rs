//! Regulation retrieval
//!
//! Features:
//! - Query embedding via an OpenAI-compatible `/embeddings` endpoint
//! - Hashed character-trigram embedder for offline development
//! - Dense similarity search via Qdrant or an in-memory cosine index
//! - Deterministic ranking with a relevance floor and oversampling
//! - YAML/JSON regulation loading
//! - Core Retriever trait implementation

pub mod embeddings;
pub mod factory;
pub mod http_embeddings;
pub mod index;
pub mod knowledge_loader;
pub mod memory_index;
pub mod retriever;
pub mod vector_store;

pub use embeddings::{EmbeddingConfig, SimpleEmbedder, TextEmbedder};
pub use factory::{build_embedder, build_index, build_retriever};
pub use http_embeddings::{HttpEmbedder, HttpEmbeddingConfig};
pub use index::{IndexHit, RegulationClause, SimilarityIndex};
pub use knowledge_loader::{KnowledgeFile, KnowledgeLoader};
pub use memory_index::InMemoryIndex;
pub use retriever::{RegulationRetriever, RetrieverConfig};
pub use vector_store::{VectorDistance, VectorStore, VectorStoreConfig};

use site_inspector_core::RetrievalError;
use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<RagError> for RetrievalError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(msg) => RetrievalError::Embedding(msg),
            RagError::DimensionMismatch { .. } => RetrievalError::Embedding(err.to_string()),
            other => RetrievalError::IndexUnavailable(other.to_string()),
        }
    }
}
