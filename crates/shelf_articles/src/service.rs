use serde::Serialize;
use shelf_core::{Article, ArticleStorage, Error, Result, SimilarityStorage};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::pipeline::{ArticlePipeline, ExtractionTicket};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

pub struct ArticleService {
    articles: Arc<dyn ArticleStorage>,
    similarity: Arc<dyn SimilarityStorage>,
    pipeline: Arc<ArticlePipeline>,
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{}: expected an http or https URL", raw)));
    }
    Ok(url)
}

/// 1-based page and page size, out-of-range values replaced by defaults
pub fn normalize_page(page: i64, limit: i64) -> (usize, usize) {
    let page = if page < 1 { 1 } else { page as usize };
    let limit = if limit < 1 || limit > MAX_PAGE_SIZE as i64 {
        DEFAULT_PAGE_SIZE
    } else {
        limit as usize
    };
    (page, limit)
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticleStorage>,
        similarity: Arc<dyn SimilarityStorage>,
        pipeline: Arc<ArticlePipeline>,
    ) -> Self {
        Self {
            articles,
            similarity,
            pipeline,
        }
    }

    /// Save a link and queue its metadata extraction.
    ///
    /// When the pipeline refuses the job the saved row is removed again.
    pub async fn create_article(&self, user_id: Uuid, url: &str) -> Result<(Article, ExtractionTicket)> {
        let url = validate_url(url)?;
        let article = Article::new(user_id, url.as_str());
        self.articles.create_article(&article).await?;
        let ticket = match self.pipeline.submit(article.id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                if let Err(cleanup) = self.articles.delete_article(article.id).await {
                    warn!(article_id = %article.id, "Failed to remove unqueued article: {}", cleanup);
                }
                return Err(e);
            }
        };

        info!(user_id = %user_id, article_id = %article.id, "Saved article {}", article.url);
        Ok((article, ticket))
    }

    /// The article when it belongs to `user_id`; other users' articles are reported missing
    pub async fn get_article(&self, id: Uuid, user_id: Uuid) -> Result<Article> {
        let article = self.articles.get_article(id).await?;
        if !article.is_owned_by(user_id) {
            return Err(Error::NotFound(format!("article {}", id)));
        }
        Ok(article)
    }

    pub async fn list_user_articles(&self, user_id: Uuid, page: i64, limit: i64) -> Result<ArticlePage> {
        let (page, limit) = normalize_page(page, limit);
        let offset = (page - 1) * limit;

        let articles = self.articles.list_by_user(user_id, offset, limit).await?;
        let total = self.articles.count_by_user(user_id).await?;
        Ok(ArticlePage {
            articles,
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        })
    }

    pub async fn delete_article(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.get_article(id, user_id).await?;
        self.similarity.remove_article(id).await?;
        self.articles.delete_article(id).await?;
        info!(user_id = %user_id, article_id = %id, "Deleted article");
        Ok(())
    }
}
