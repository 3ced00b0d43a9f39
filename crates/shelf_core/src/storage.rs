use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{Article, Rating, RatingStats};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Persist a new article
    async fn create_article(&self, article: &Article) -> Result<()>;

    /// Fetch an article by id, `Error::NotFound` when absent
    async fn get_article(&self, id: Uuid) -> Result<Article>;

    /// Overwrite an existing article
    async fn update_article(&self, article: &Article) -> Result<()>;

    async fn delete_article(&self, id: Uuid) -> Result<()>;

    /// Articles saved by a user, newest first
    async fn list_by_user(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Article>>;

    async fn count_by_user(&self, user_id: Uuid) -> Result<usize>;

    /// Articles whose metadata extraction failed and may be retried, oldest update first
    async fn find_failed_metadata(&self, max_retries: i32) -> Result<Vec<Article>>;

    /// Successfully processed articles in popularity order.
    ///
    /// Articles with at least `popularity::MIN_RATINGS` ratings come first, by rating
    /// count then average score; everything else follows. Creation time breaks ties.
    async fn find_popular(&self, limit: usize) -> Result<Vec<Article>>;
}

#[async_trait]
pub trait RatingStorage: Send + Sync {
    /// Insert a rating or update the score of the existing (user, article) pair
    async fn upsert_rating(&self, rating: &Rating) -> Result<Rating>;

    async fn get_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<Option<Rating>>;

    async fn delete_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<()>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Rating>>;

    async fn average_and_count(&self, article_id: Uuid) -> Result<RatingStats>;
}

#[async_trait]
pub trait SimilarityStorage: Send + Sync {
    /// Make the article's embedding searchable, replacing any previous vector
    async fn index_article(&self, article: &Article) -> Result<()>;

    async fn remove_article(&self, article_id: Uuid) -> Result<()>;

    /// Nearest articles to `query`, closest first.
    ///
    /// Only articles with successful metadata and embedding status are returned,
    /// and never those owned by `exclude_owner`.
    async fn find_similar(&self, query: &[f32], exclude_owner: Uuid, limit: usize) -> Result<Vec<Article>>;
}
