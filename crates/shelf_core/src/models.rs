use async_trait::async_trait;

use crate::types::{Classification, ProviderHealth};
use crate::Result;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Generate an embedding for a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate one embedding per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Cosine similarity between two embeddings
    async fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32>;

    /// Judge whether text looks like article content
    async fn classify(&self, text: &str) -> Result<Classification>;

    async fn health(&self) -> Result<ProviderHealth>;
}
