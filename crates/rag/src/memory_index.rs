//! In-memory cosine index
//!
//! Used when no vector database is configured. Knowledge files are embedded
//! at startup; search is a linear scan.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::embeddings::cosine_similarity;
use crate::index::{IndexHit, RegulationClause, SimilarityIndex};
use crate::RagError;

struct Entry {
    clause: RegulationClause,
    embedding: Vec<f32>,
}

/// Linear-scan index
pub struct InMemoryIndex {
    dimension: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_dim(&self, v: &[f32]) -> Result<(), RagError> {
        if v.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: v.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn upsert(
        &self,
        clauses: &[RegulationClause],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RagError> {
        if clauses.len() != embeddings.len() {
            return Err(RagError::Index(
                "Clause and embedding count mismatch".to_string(),
            ));
        }
        for emb in embeddings {
            self.check_dim(emb)?;
        }

        let mut entries = self.entries.write();
        for (clause, embedding) in clauses.iter().zip(embeddings) {
            match entries.iter_mut().find(|e| e.clause.id == clause.id) {
                Some(existing) => {
                    existing.clause = clause.clone();
                    existing.embedding = embedding.clone();
                },
                None => entries.push(Entry {
                    clause: clause.clone(),
                    embedding: embedding.clone(),
                }),
            }
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<IndexHit>, RagError> {
        self.check_dim(embedding)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut hits: Vec<IndexHit> = entries
            .iter()
            .map(|e| IndexHit {
                clause: e.clause.clone(),
                score: cosine_similarity(embedding, &e.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.clause.id.cmp(&b.clause.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, RagError> {
        Ok(self.len() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(id: &str) -> RegulationClause {
        RegulationClause {
            id: id.into(),
            document_title: "T".into(),
            document_number: "N".into(),
            clause_number: "1".into(),
            clause_text: format!("text {}", id),
            keywords: vec![],
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(
                &[clause("a"), clause("b"), clause("c")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.clause.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new(2);
        index.upsert(&[clause("a")], &[vec![1.0, 0.0]]).await.unwrap();
        index.upsert(&[clause("a")], &[vec![0.0, 1.0]]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let hits = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dimension_checked() {
        let index = InMemoryIndex::new(3);
        assert!(index.upsert(&[clause("a")], &[vec![1.0]]).await.is_err());
        assert!(matches!(
            index.search(&[1.0], 1).await,
            Err(RagError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new(2);
        assert!(index.search(&[1.0, 0.0], 3).await.unwrap().is_empty());
        assert!(index.is_empty());
    }
}
