use shelf_core::{ArticleStorage, Error, Rating, RatingStorage, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct RatingService {
    articles: Arc<dyn ArticleStorage>,
    ratings: Arc<dyn RatingStorage>,
}

impl RatingService {
    pub fn new(articles: Arc<dyn ArticleStorage>, ratings: Arc<dyn RatingStorage>) -> Self {
        Self { articles, ratings }
    }

    /// Create or update the user's rating of an article
    pub async fn rate_article(&self, user_id: Uuid, article_id: Uuid, score: i32) -> Result<Rating> {
        if !Rating::is_valid_score(score) {
            return Err(Error::InvalidInput(format!(
                "score must be between {} and {}, got {}",
                Rating::MIN_SCORE,
                Rating::MAX_SCORE,
                score
            )));
        }

        let article = self.articles.get_article(article_id).await?;
        if article.is_owned_by(user_id) {
            return Err(Error::Forbidden("users cannot rate their own articles".to_string()));
        }

        let rating = self.ratings.upsert_rating(&Rating::new(user_id, article_id, score)).await?;
        info!(user_id = %user_id, article_id = %article_id, score, "Rated article");
        Ok(rating)
    }

    pub async fn get_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<Rating> {
        self.ratings
            .get_rating(user_id, article_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rating for article {}", article_id)))
    }

    pub async fn delete_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<()> {
        self.ratings.delete_rating(user_id, article_id).await
    }
}
