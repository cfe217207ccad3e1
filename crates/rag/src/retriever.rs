//! Regulation Retriever
//!
//! Embeds the violation description, oversamples the index, drops
//! candidates under the relevance floor and returns the top-k in a
//! deterministic order. The same query against the same index always yields
//! the same list.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use site_inspector_config::{constants::rag, Settings};
use site_inspector_core::{RetrievalError, RetrievedDocument, Retriever};

use crate::embeddings::TextEmbedder;
use crate::index::SimilarityIndex;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Minimum score threshold
    pub min_score: f32,
    /// Candidates fetched per requested result
    pub oversample: usize,
    /// Upper bound on `top_k`
    pub max_top_k: usize,
    /// Whole-call deadline (embedding plus search)
    pub timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            min_score: rag::MIN_SCORE,
            oversample: rag::OVERSAMPLE,
            max_top_k: rag::MAX_TOP_K,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetrieverConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_score: settings.rag.min_score,
            oversample: settings.rag.oversample.max(1),
            max_top_k: rag::MAX_TOP_K,
            timeout: settings.timeouts.retrieval(),
        }
    }
}

/// Dense retriever over a [`SimilarityIndex`]
pub struct RegulationRetriever {
    embedder: Arc<dyn TextEmbedder>,
    index: Arc<dyn SimilarityIndex>,
    config: RetrieverConfig,
}

impl RegulationRetriever {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        index: Arc<dyn SimilarityIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let embedding = self.embedder.embed(query).await?;
        let limit = top_k.saturating_mul(self.config.oversample.max(1));
        let hits = self.index.search(&embedding, limit).await?;

        let mut docs: Vec<RetrievedDocument> = hits
            .into_iter()
            .filter(|hit| hit.score.is_finite() && hit.score >= self.config.min_score)
            .map(|hit| hit.into_document())
            .collect();

        docs.sort_by(RetrievedDocument::rank_cmp);

        let mut seen = HashSet::new();
        docs.retain(|doc| seen.insert(doc.document_id.clone()));
        docs.truncate(top_k);
        Ok(docs)
    }
}

#[async_trait]
impl Retriever for RegulationRetriever {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let query = query.trim();
        let top_k = top_k.min(self.config.max_top_k);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let docs = tokio::time::timeout(self.config.timeout, self.search(query, top_k))
            .await
            .map_err(|_| RetrievalError::Timeout(self.config.timeout))??;

        tracing::debug!(
            index = self.index.name(),
            embedder = self.embedder.name(),
            results = docs.len(),
            top_score = docs.first().map(|d| d.relevance_score).unwrap_or(0.0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved regulation excerpts"
        );

        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingConfig, SimpleEmbedder};
    use crate::index::{IndexHit, RegulationClause};
    use crate::memory_index::InMemoryIndex;
    use crate::RagError;

    fn clause(id: &str, number: &str, clause_no: &str, text: &str) -> RegulationClause {
        RegulationClause {
            id: id.into(),
            document_title: "Несущие и ограждающие конструкции".into(),
            document_number: number.into(),
            clause_number: clause_no.into(),
            clause_text: text.into(),
            keywords: vec![],
        }
    }

    /// Index returning canned hits, including duplicates and ties
    struct CannedIndex(Vec<IndexHit>);

    #[async_trait]
    impl SimilarityIndex for CannedIndex {
        async fn upsert(&self, _: &[RegulationClause], _: &[Vec<f32>]) -> Result<(), RagError> {
            Ok(())
        }
        async fn search(&self, _: &[f32], limit: usize) -> Result<Vec<IndexHit>, RagError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
        async fn count(&self) -> Result<u64, RagError> {
            Ok(self.0.len() as u64)
        }
        fn name(&self) -> &str {
            "canned"
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl TextEmbedder for SlowEmbedder {
        async fn embed(&self, _: &str) -> Result<Vec<f32>, RagError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![0.0])
        }
        fn dimension(&self) -> usize {
            1
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    fn hash_embedder() -> Arc<dyn TextEmbedder> {
        Arc::new(SimpleEmbedder::new(EmbeddingConfig::default()))
    }

    async fn populated() -> RegulationRetriever {
        let embedder = hash_embedder();
        let index = Arc::new(InMemoryIndex::new(embedder.dimension()));
        let clauses = vec![
            clause("a", "СП 70.13330.2012", "9.1.5", "Трещины в несущих стенах не допускаются"),
            clause("b", "СП 63.13330.2018", "8.3.1", "Защитный слой бетона для арматуры"),
            clause("c", "СП 48.13330.2019", "7.1", "Строительный контроль на площадке"),
            clause("d", "СП 70.13330.2012", "9.2.1", "Ширина раскрытия трещин в стенах"),
        ];
        let texts: Vec<String> = clauses.iter().map(|c| c.embedding_text()).collect();
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        index.upsert(&clauses, &embeddings).await.unwrap();
        RegulationRetriever::new(embedder, index, RetrieverConfig::default())
    }

    #[tokio::test]
    async fn test_returns_at_most_top_k_sorted() {
        let retriever = populated().await;
        let docs = retriever.retrieve("трещина в несущей стене", 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
        assert!(docs[0].excerpt_text.contains("трещин") || docs[0].excerpt_text.contains("Трещин"));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let retriever = populated().await;
        let first = retriever.retrieve("трещина в стене, дом 12", 3).await.unwrap();
        let second = retriever.retrieve("трещина в стене, дом 12", 3).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_index_is_not_an_error() {
        let embedder = hash_embedder();
        let index = Arc::new(InMemoryIndex::new(embedder.dimension()));
        let retriever = RegulationRetriever::new(embedder, index, RetrieverConfig::default());
        assert!(retriever.retrieve("трещина", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_or_zero_k() {
        let retriever = populated().await;
        assert!(retriever.retrieve("   ", 3).await.unwrap().is_empty());
        assert!(retriever.retrieve("трещина", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_dedupe_and_floor() {
        let hits = vec![
            IndexHit { clause: clause("z", "СП 2", "1", "x"), score: 0.5 },
            IndexHit { clause: clause("y", "СП 1", "1", "x"), score: 0.5 },
            IndexHit { clause: clause("y", "СП 1", "1", "x"), score: 0.5 },
            IndexHit { clause: clause("w", "СП 3", "1", "x"), score: 0.9 },
            IndexHit { clause: clause("v", "СП 4", "1", "x"), score: 0.05 },
        ];
        let retriever = RegulationRetriever::new(
            hash_embedder(),
            Arc::new(CannedIndex(hits)),
            RetrieverConfig {
                min_score: 0.1,
                ..Default::default()
            },
        );

        let docs = retriever.retrieve("x", 5).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["w", "y", "z"]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let retriever = RegulationRetriever::new(
            Arc::new(SlowEmbedder),
            Arc::new(InMemoryIndex::new(1)),
            RetrieverConfig {
                timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );
        assert!(matches!(
            retriever.retrieve("x", 3).await,
            Err(RetrievalError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let retriever = RegulationRetriever::new(
            hash_embedder(),
            Arc::new(InMemoryIndex::new(8)),
            RetrieverConfig::default(),
        );
        assert!(matches!(
            retriever.retrieve("трещина", 3).await,
            Err(RetrievalError::Embedding(_))
        ));
    }
}
