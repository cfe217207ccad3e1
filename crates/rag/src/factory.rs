//! Settings-driven construction of the retrieval stack

use std::path::Path;
use std::sync::Arc;

use site_inspector_config::{EmbedderKind, IndexBackend, Settings};

use crate::embeddings::{EmbeddingConfig, SimpleEmbedder, TextEmbedder};
use crate::http_embeddings::{HttpEmbedder, HttpEmbeddingConfig};
use crate::index::SimilarityIndex;
use crate::knowledge_loader::KnowledgeLoader;
use crate::memory_index::InMemoryIndex;
use crate::retriever::{RegulationRetriever, RetrieverConfig};
use crate::vector_store::{VectorStore, VectorStoreConfig};
use crate::RagError;

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn TextEmbedder>, RagError> {
    match settings.rag.embedder {
        EmbedderKind::Http => Ok(Arc::new(HttpEmbedder::new(
            HttpEmbeddingConfig::from_settings(settings),
        )?)),
        EmbedderKind::Hash => Ok(Arc::new(SimpleEmbedder::new(EmbeddingConfig {
            embedding_dim: settings.rag.embedding_dim,
            normalize: true,
        }))),
    }
}

/// Open the configured index. The in-memory index is filled from the
/// knowledge directory; Qdrant is expected to be populated by
/// `ingest-knowledge`.
pub async fn build_index(
    settings: &Settings,
    embedder: &dyn TextEmbedder,
) -> Result<Arc<dyn SimilarityIndex>, RagError> {
    match settings.rag.backend {
        IndexBackend::Memory => {
            let index = InMemoryIndex::new(embedder.dimension());
            KnowledgeLoader::load_directory(
                Path::new(&settings.rag.knowledge_dir),
                &index,
                embedder,
            )
            .await?;
            Ok(Arc::new(index))
        },
        IndexBackend::Qdrant => {
            let store =
                VectorStore::new(VectorStoreConfig::from_settings(settings, embedder.dimension()))
                    .await?;
            store.ensure_collection().await?;
            match store.count().await {
                Ok(0) => tracing::warn!(
                    collection = store.collection(),
                    "Qdrant collection is empty; run ingest-knowledge"
                ),
                Ok(points) => tracing::info!(collection = store.collection(), points, "Qdrant collection ready"),
                Err(e) => tracing::warn!(error = %e, "Could not read Qdrant collection info"),
            }
            Ok(Arc::new(store))
        },
    }
}

pub async fn build_retriever(settings: &Settings) -> Result<RegulationRetriever, RagError> {
    let embedder = build_embedder(settings)?;
    let index = build_index(settings, embedder.as_ref()).await?;
    Ok(RegulationRetriever::new(
        embedder,
        index,
        RetrieverConfig::from_settings(settings),
    ))
}
