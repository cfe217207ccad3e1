//! Similarity index abstraction
//!
//! A clause is one indexed excerpt of a normative document. Both the Qdrant
//! store and the in-memory index implement [`SimilarityIndex`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use site_inspector_core::{RetrievedDocument, SourceReference};

use crate::RagError;

/// One clause of a normative document, as stored in knowledge files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationClause {
    /// Unique clause ID, e.g. `sp70-9.1.5`
    pub id: String,
    /// e.g. "Несущие и ограждающие конструкции"
    pub document_title: String,
    /// e.g. "СП 70.13330.2012"
    pub document_number: String,
    #[serde(default)]
    pub clause_number: String,
    /// Clause text (embedded)
    pub clause_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl RegulationClause {
    pub fn source(&self) -> SourceReference {
        SourceReference::new(
            self.document_title.clone(),
            self.document_number.clone(),
            self.clause_number.clone(),
        )
    }

    /// Text handed to the embedder: clause body plus its keywords
    pub fn embedding_text(&self) -> String {
        if self.keywords.is_empty() {
            self.clause_text.clone()
        } else {
            format!("{}\n{}", self.clause_text, self.keywords.join(", "))
        }
    }
}

/// Raw search hit
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub clause: RegulationClause,
    /// Similarity, higher is closer
    pub score: f32,
}

impl IndexHit {
    pub fn into_document(self) -> RetrievedDocument {
        RetrievedDocument {
            source: self.clause.source(),
            document_id: self.clause.id,
            excerpt_text: self.clause.clause_text,
            relevance_score: self.score,
        }
    }
}

/// Dense vector index
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Insert or replace clauses by ID
    async fn upsert(
        &self,
        clauses: &[RegulationClause],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RagError>;

    /// Nearest clauses to `embedding`, at most `limit`
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<IndexHit>, RagError>;

    /// Number of indexed clauses
    async fn count(&self) -> Result<u64, RagError>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause() -> RegulationClause {
        RegulationClause {
            id: "sp70-9.1.5".into(),
            document_title: "Несущие и ограждающие конструкции".into(),
            document_number: "СП 70.13330.2012".into(),
            clause_number: "9.1.5".into(),
            clause_text: "Трещины в несущих стенах не допускаются.".into(),
            keywords: vec!["трещина".into(), "стена".into()],
        }
    }

    #[test]
    fn test_hit_into_document() {
        let doc = IndexHit {
            clause: clause(),
            score: 0.82,
        }
        .into_document();
        assert_eq!(doc.document_id, "sp70-9.1.5");
        assert_eq!(doc.source.citation(), "СП 70.13330.2012, п. 9.1.5");
        assert_eq!(doc.relevance_score, 0.82);
    }

    #[test]
    fn test_embedding_text_includes_keywords() {
        let text = clause().embedding_text();
        assert!(text.starts_with("Трещины"));
        assert!(text.ends_with("трещина, стена"));
    }
}
