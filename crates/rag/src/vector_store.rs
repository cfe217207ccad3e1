//! Vector Store using Qdrant
//!
//! Clause payload keys: `document_id`, `document_title`, `document_number`,
//! `clause_number`, `clause_text`, `keywords`. Qdrant only accepts UUID or
//! integer point IDs, so the clause ID is mapped to a name-based UUID and
//! kept verbatim in the payload.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, Value, VectorParamsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;
use uuid::Uuid;

use site_inspector_config::{constants::endpoints, Settings};

use crate::index::{IndexHit, RegulationClause, SimilarityIndex};
use crate::RagError;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// Distance metric
    pub distance: VectorDistance,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.to_string(),
            collection: "pipeline_standards".to_string(),
            vector_dim: 1536,
            distance: VectorDistance::Cosine,
            api_key: None,
        }
    }
}

impl VectorStoreConfig {
    pub fn from_settings(settings: &Settings, vector_dim: usize) -> Self {
        Self {
            endpoint: settings.rag.qdrant_endpoint.clone(),
            collection: settings.rag.collection.clone(),
            vector_dim,
            distance: VectorDistance::Cosine,
            api_key: settings.rag.qdrant_api_key.clone(),
        }
    }
}

/// Distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDistance {
    Cosine,
    Euclidean,
    DotProduct,
}

impl From<VectorDistance> for Distance {
    fn from(d: VectorDistance) -> Self {
        match d {
            VectorDistance::Cosine => Distance::Cosine,
            VectorDistance::Euclidean => Distance::Euclid,
            VectorDistance::DotProduct => Distance::Dot,
        }
    }
}

/// Qdrant point ID for a clause ID
pub fn point_id(clause_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, clause_id.as_bytes()).to_string()
}

fn clause_payload(clause: &RegulationClause) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("document_id".to_string(), clause.id.clone().into());
    payload.insert("document_title".to_string(), clause.document_title.clone().into());
    payload.insert("document_number".to_string(), clause.document_number.clone().into());
    payload.insert("clause_number".to_string(), clause.clause_number.clone().into());
    payload.insert("clause_text".to_string(), clause.clause_text.clone().into());
    payload.insert("keywords".to_string(), clause.keywords.join(", ").into());
    payload
}

fn clause_from_payload(payload: HashMap<String, Value>, fallback_id: String) -> RegulationClause {
    let mut fields: HashMap<String, String> = payload
        .into_iter()
        .filter_map(|(k, v)| match v.kind {
            Some(Kind::StringValue(s)) => Some((k, s)),
            _ => None,
        })
        .collect();
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();

    let id = take("document_id");
    let keywords = take("keywords");
    RegulationClause {
        id: if id.is_empty() { fallback_id } else { id },
        document_title: take("document_title"),
        document_number: take("document_number"),
        clause_number: take("clause_number"),
        clause_text: take("clause_text"),
        keywords: keywords
            .split(", ")
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Vector store client
pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    /// Create a new vector store connection
    pub async fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Create collection if not exists
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(
                            self.config.vector_dim as u64,
                            Distance::from(self.config.distance),
                        ),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
            tracing::info!(collection = %self.config.collection, "Created Qdrant collection");
        }

        Ok(())
    }

    /// Drop the collection if present
    pub async fn drop_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;
        if exists {
            self.client
                .delete_collection(&self.config.collection)
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SimilarityIndex for VectorStore {
    async fn upsert(
        &self,
        clauses: &[RegulationClause],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RagError> {
        if clauses.len() != embeddings.len() {
            return Err(RagError::VectorStore(
                "Clause and embedding count mismatch".to_string(),
            ));
        }

        let points: Vec<PointStruct> = clauses
            .iter()
            .zip(embeddings.iter())
            .map(|(clause, emb)| {
                PointStruct::new(point_id(&clause.id), emb.clone(), clause_payload(clause))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<IndexHit>, RagError> {
        if embedding.len() != self.config.vector_dim {
            return Err(RagError::DimensionMismatch {
                expected: self.config.vector_dim,
                actual: embedding.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let request =
            SearchPointsBuilder::new(&self.config.collection, embedding.to_vec(), limit as u64)
                .with_payload(true);

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let fallback_id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        },
                        None => String::new(),
                    })
                    .unwrap_or_default();

                IndexHit {
                    clause: clause_from_payload(point.payload, fallback_id),
                    score: point.score,
                }
            })
            .collect();

        Ok(hits)
    }

    async fn count(&self) -> Result<u64, RagError> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0))
    }

    fn name(&self) -> &str {
        "qdrant"
    }
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
            clause_text: "Трещины не допускаются.".into(),
            keywords: vec!["трещина".into(), "стена".into()],
        }
    }

    #[test]
    fn test_config_default() {
        let config = VectorStoreConfig::default();
        assert_eq!(config.collection, "pipeline_standards");
        assert_eq!(config.distance, VectorDistance::Cosine);
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("sp70-9.1.5");
        assert_eq!(a, point_id("sp70-9.1.5"));
        assert_ne!(a, point_id("sp70-9.1.6"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_payload_round_trip() {
        let original = clause();
        let parsed = clause_from_payload(clause_payload(&original), "fallback".into());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_payload_without_id_uses_point_id() {
        let mut payload = clause_payload(&clause());
        payload.remove("document_id");
        let parsed = clause_from_payload(payload, "1234".into());
        assert_eq!(parsed.id, "1234");
    }
}
