use async_trait::async_trait;
use chrono::Utc;
use shelf_core::{Article, ArticleStorage, ProcessingStatus, Result, SimilarityStorage};
use shelf_inference::ArticleEmbedder;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::extractor::MetadataExtractor;
use crate::logging::Logger;
use crate::retry::RetryJob;

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Runs metadata extraction and embedding for stored articles
pub struct ArticleProcessor {
    articles: Arc<dyn ArticleStorage>,
    similarity: Arc<dyn SimilarityStorage>,
    extractor: Arc<dyn MetadataExtractor>,
    embedder: ArticleEmbedder,
    max_retries: i32,
    retry_pause: Duration,
    logger: Logger,
}

impl ArticleProcessor {
    pub fn new(
        articles: Arc<dyn ArticleStorage>,
        similarity: Arc<dyn SimilarityStorage>,
        extractor: Arc<dyn MetadataExtractor>,
        embedder: ArticleEmbedder,
    ) -> Self {
        Self {
            articles,
            similarity,
            extractor,
            embedder,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_pause: DEFAULT_RETRY_PAUSE,
            logger: Logger::new().with_prefix("[processor]"),
        }
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay between consecutive attempts of one retry sweep
    pub fn with_retry_pause(mut self, retry_pause: Duration) -> Self {
        self.retry_pause = retry_pause;
        self
    }

    /// Fetch metadata for the article and embed it.
    ///
    /// Extraction failures mark the article failed, bump its retry count and are
    /// returned. Embedding failures only mark the embedding status failed.
    pub async fn extract_metadata(&self, article_id: Uuid) -> Result<Article> {
        let logger = self.logger.clone().with_prefix(format!("[{}]", article_id));
        let mut article = self.articles.get_article(article_id).await?;
        logger.info(&format!("Extracting metadata from {}", article.url));

        let metadata = match self.extractor.extract(&article.url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                logger.error(&format!("Metadata extraction failed: {}", e));
                article.metadata_status = ProcessingStatus::Failed;
                article.retry_count += 1;
                article.updated_at = Utc::now();
                self.articles.update_article(&article).await?;
                return Err(e);
            }
        };

        article.title = metadata.title;
        article.description = metadata.description;
        article.content = metadata.content;
        article.image_url = metadata.image_url;
        article.word_count = metadata.word_count;
        article.confidence_score = metadata.confidence;
        article.metadata_status = ProcessingStatus::Success;

        if let Err(e) = self.embedder.embed_article(&mut article).await {
            logger.warn(&format!("Embedding failed, article stays out of recommendations: {}", e));
        }
        article.updated_at = Utc::now();
        self.articles.update_article(&article).await?;

        if article.embedding_status == ProcessingStatus::Success {
            self.similarity.index_article(&article).await?;
        }

        logger.info(&format!("Article processed ({} words)", article.word_count));
        Ok(article)
    }

    /// Retry failed extractions that still have attempts left, oldest first
    pub async fn retry_failed_metadata(&self) -> Result<RetrySummary> {
        let failed = self.articles.find_failed_metadata(self.max_retries).await?;
        if failed.is_empty() {
            self.logger.debug("No failed articles to retry");
            return Ok(RetrySummary::default());
        }

        self.logger
            .info(&format!("Retrying metadata extraction for {} articles", failed.len()));
        let mut summary = RetrySummary::default();
        for (i, article) in failed.iter().enumerate() {
            if i > 0 && !self.retry_pause.is_zero() {
                tokio::time::sleep(self.retry_pause).await;
            }
            summary.attempted += 1;
            if self.extract_metadata(article.id).await.is_ok() {
                summary.succeeded += 1;
            }
        }

        self.logger.info(&format!(
            "Retry sweep finished: {}/{} succeeded",
            summary.succeeded, summary.attempted
        ));
        Ok(summary)
    }
}

#[async_trait]
impl RetryJob for ArticleProcessor {
    fn name(&self) -> &str {
        "failed-metadata"
    }

    async fn run(&self) -> Result<()> {
        self.retry_failed_metadata().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractedMetadata;
    use shelf_core::Error;
    use shelf_inference::HashEmbedder;
    use shelf_storage::InMemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds
    struct FlakyExtractor {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataExtractor for FlakyExtractor {
        async fn extract(&self, url: &str) -> Result<ExtractedMetadata> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Error::Extraction(format!("timeout fetching {}", url)));
            }
            Ok(ExtractedMetadata {
                title: "Ownership".to_string(),
                description: "Borrowing rules".to_string(),
                content: "Some body text".to_string(),
                image_url: None,
                word_count: 3,
                confidence: 0.9,
            })
        }
    }

    fn processor(storage: &InMemoryStorage, failures: usize) -> ArticleProcessor {
        let storage = Arc::new(storage.clone());
        ArticleProcessor::new(
            storage.clone(),
            storage,
            Arc::new(FlakyExtractor {
                failures,
                calls: AtomicUsize::new(0),
            }),
            ArticleEmbedder::new(Arc::new(HashEmbedder::new(16).unwrap())),
        )
        .with_retry_pause(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_extract_metadata_success() {
        let storage = InMemoryStorage::new();
        let article = Article::new(Uuid::new_v4(), "https://example.com/a");
        storage.create_article(&article).await.unwrap();

        let processed = processor(&storage, 0).extract_metadata(article.id).await.unwrap();
        assert_eq!(processed.title, "Ownership");
        assert!(processed.is_recommendable());

        let stored = storage.get_article(article.id).await.unwrap();
        assert_eq!(stored.metadata_status, ProcessingStatus::Success);
        assert_eq!(stored.embedding_status, ProcessingStatus::Success);
        assert_eq!(stored.embedding.map(|e| e.len()), Some(16));
    }

    #[tokio::test]
    async fn test_extract_metadata_failure_counts_retry() {
        let storage = InMemoryStorage::new();
        let article = Article::new(Uuid::new_v4(), "https://example.com/a");
        storage.create_article(&article).await.unwrap();

        let result = processor(&storage, 1).extract_metadata(article.id).await;
        assert!(matches!(result, Err(Error::Extraction(_))));

        let stored = storage.get_article(article.id).await.unwrap();
        assert_eq!(stored.metadata_status, ProcessingStatus::Failed);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn test_retry_sweep_skips_exhausted_articles() {
        let storage = InMemoryStorage::new();
        let user = Uuid::new_v4();

        let mut retryable = Article::new(user, "https://example.com/retry");
        retryable.metadata_status = ProcessingStatus::Failed;
        retryable.retry_count = 1;
        let mut exhausted = Article::new(user, "https://example.com/exhausted");
        exhausted.metadata_status = ProcessingStatus::Failed;
        exhausted.retry_count = DEFAULT_MAX_RETRIES;
        storage.create_article(&retryable).await.unwrap();
        storage.create_article(&exhausted).await.unwrap();

        let summary = processor(&storage, 0).retry_failed_metadata().await.unwrap();
        assert_eq!(summary, RetrySummary { attempted: 1, succeeded: 1 });

        let stored = storage.get_article(exhausted.id).await.unwrap();
        assert_eq!(stored.metadata_status, ProcessingStatus::Failed);
        assert_eq!(stored.retry_count, DEFAULT_MAX_RETRIES);
    }
}
