//! Text Embeddings
//!
//! The [`TextEmbedder`] trait is what the retriever and the knowledge loader
//! depend on. [`SimpleEmbedder`] is a deterministic offline implementation.

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::RagError;

/// Dense embedding backend
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output dimension
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Normalize embeddings to unit length
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            normalize: true,
        }
    }
}

/// Hashed character-trigram embedder
///
/// Words are lowercased and padded, so texts that share word stems land
/// close together. Good enough to exercise retrieval without a network.
pub struct SimpleEmbedder {
    config: EmbeddingConfig,
}

impl SimpleEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    /// Generate a hash-based embedding
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let dim = self.config.embedding_dim.max(1);
        let mut embedding = vec![0.0f32; dim];

        for word in text.unicode_words() {
            let padded: Vec<char> = std::iter::once('^')
                .chain(word.to_lowercase().chars())
                .chain(std::iter::once('$'))
                .collect();
            for gram in padded.windows(3) {
                let idx = (fnv1a(gram) % dim as u64) as usize;
                embedding[idx] += 1.0;
            }
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        for byte in (*c as u32).to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

#[async_trait]
impl TextEmbedder for SimpleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Cosine similarity; zero when either vector is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_embedder() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let embedding = embedder.embed_sync("Трещина в несущей стене");

        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_deterministic_and_case_insensitive() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        assert_eq!(
            embedder.embed_sync("Армирование плиты"),
            embedder.embed_sync("армирование   ПЛИТЫ")
        );
    }

    #[test]
    fn test_shared_stems_are_closer() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let query = embedder.embed_sync("трещина в стене");
        let related = embedder.embed_sync("трещины в несущих стенах не допускаются");
        let unrelated = embedder.embed_sync("антикоррозионная защита арматуры");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let v = embedder.embed_sync("   ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }
}
