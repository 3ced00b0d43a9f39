use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shelf_core::vector::{cosine_similarity, l2_normalize};
use shelf_core::{Classification, EmbeddingProvider, Error, ProviderHealth, Result};
use std::fmt;

const ARTICLE_WORDS: f64 = 300.0;

/// Offline embedder based on feature hashing of lowercase word tokens.
///
/// Texts sharing vocabulary end up close in cosine space, which is enough for local
/// runs and tests without the embedding service.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidInput("embedding dimension must be positive".to_string()));
        }
        Ok(Self { dimension })
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(|token| token.to_lowercase())
    }

    fn hash_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimension];
        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[index] += sign;
        }
        l2_normalize(&mut embedding);
        embedding
    }
}

impl fmt::Debug for HashEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashEmbedder").field("dimension", &self.dimension).finish()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("empty text provided".to_string()));
        }
        Ok(self.hash_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.hash_embedding(text)).collect())
    }

    async fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        cosine_similarity(a, b)
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        if text.is_empty() {
            return Err(Error::InvalidInput("empty text provided".to_string()));
        }
        // Longer prose reads more like an article
        let words = Self::tokens(text).count() as f64;
        let confidence = (words / ARTICLE_WORDS).min(1.0);
        Ok(Classification {
            is_article: confidence >= 0.5,
            confidence,
        })
    }

    async fn health(&self) -> Result<ProviderHealth> {
        Ok(ProviderHealth {
            status: "healthy".to_string(),
            embedding_model: "feature-hashing".to_string(),
            embedding_model_loaded: true,
        })
    }
}
