use shelf_core::{Article, EmbeddingProvider, ProcessingStatus, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attaches embeddings to articles using their profile text
pub struct ArticleEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl ArticleEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Embed the article's title and description.
    ///
    /// On success the article carries the vector and a successful embedding status;
    /// provider failures mark the status failed and are returned to the caller.
    pub async fn embed_article(&self, article: &mut Article) -> Result<()> {
        let text = article.profile_text();
        if text.is_empty() {
            debug!("Article {} has no text to embed", article.id);
            article.embedding = None;
            article.embedding_status = ProcessingStatus::Failed;
            return Ok(());
        }

        match self.provider.embed(&text).await {
            Ok(embedding) => {
                article.embedding = Some(embedding);
                article.embedding_status = ProcessingStatus::Success;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to embed article {}: {}", article.id, e);
                article.embedding_status = ProcessingStatus::Failed;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HashEmbedder;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_embed_article() {
        let provider = Arc::new(HashEmbedder::new(32).unwrap());
        let embedder = ArticleEmbedder::new(provider.clone());

        let mut article = Article::new(Uuid::new_v4(), "https://example.com/a");
        article.title = "Test Article".to_string();
        article.description = "About ownership".to_string();
        embedder.embed_article(&mut article).await.unwrap();
        assert_eq!(article.embedding_status, ProcessingStatus::Success);
        assert_eq!(
            article.embedding,
            Some(provider.embed("Test Article About ownership").await.unwrap())
        );

        let mut blank = Article::new(Uuid::new_v4(), "https://example.com/b");
        embedder.embed_article(&mut blank).await.unwrap();
        assert_eq!(blank.embedding_status, ProcessingStatus::Failed);
        assert!(blank.embedding.is_none());
    }
}
