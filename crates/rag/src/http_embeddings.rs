//! HTTP Embeddings
//!
//! OpenAI-compatible `/embeddings` endpoint. Batches are sent in one request
//! and re-ordered by the `index` field of each returned item.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use site_inspector_config::Settings;

use crate::embeddings::TextEmbedder;
use crate::RagError;

/// HTTP embedding configuration
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Embedding dimension
    pub embedding_dim: usize,
    pub timeout: Duration,
}

impl Default for HttpEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpEmbeddingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            endpoint: settings.rag.embedding_endpoint.clone(),
            api_key: settings.rag.embedding_api_key.clone(),
            model: settings.rag.embedding_model.clone(),
            embedding_dim: settings.rag.embedding_dim,
            timeout: settings.timeouts.retrieval(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Debug, Deserialize)]
struct EmbedItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Remote embedder
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&EmbedRequest {
            model: &self.config.model,
            input: texts,
        });
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Embedding failed: {} - {}",
                status, text
            )));
        }

        let mut body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        body.data.sort_by_key(|item| item.index);
        body.data
            .into_iter()
            .map(|item| {
                if item.embedding.len() == self.config.embedding_dim {
                    Ok(item.embedding)
                } else {
                    Err(RagError::DimensionMismatch {
                        expected: self.config.embedding_dim,
                        actual: item.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

#[async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
