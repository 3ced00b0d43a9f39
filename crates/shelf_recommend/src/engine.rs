use async_trait::async_trait;
use shelf_core::{
    Article, ArticleStorage, EmbeddingProvider, RatingStorage, RecommendedArticle, Result, SimilarityStorage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::profile::{is_high_rating, rating_weight, weighted_profile};

pub const CONTENT_BASED_ENGINE: &str = "content-based";
pub const POPULARITY_ENGINE: &str = "popularity";

/// Similarity matches are pre-filtered by the store, so they share one confidence
pub const CONTENT_BASED_SCORE: f64 = 0.8;
pub const POPULARITY_SCORE: f64 = 0.7;

pub const CONTENT_BASED_REASON: &str = "Similar to articles you rated highly";
pub const POPULARITY_REASON: &str = "Popular article (no rating history available)";

#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` recommendations for `user_id`, never including the user's own articles
    async fn recommend(&self, user_id: Uuid, limit: usize) -> Result<Vec<RecommendedArticle>>;
}

fn wrap(article: Article, score: f64, reason: &str, engine: &str) -> RecommendedArticle {
    RecommendedArticle {
        article,
        score,
        reason: reason.to_string(),
        recommender_used: engine.to_string(),
    }
}

/// Most popular articles not owned by `user_id`, labelled with the calling engine's name
async fn popular_recommendations(
    articles: &dyn ArticleStorage,
    user_id: Uuid,
    limit: usize,
    engine: &str,
) -> Result<Vec<RecommendedArticle>> {
    let popular = articles.find_popular(limit.saturating_mul(2)).await?;
    let recommendations: Vec<_> = popular
        .into_iter()
        .filter(|article| !article.is_owned_by(user_id))
        .take(limit)
        .map(|article| wrap(article, POPULARITY_SCORE, POPULARITY_REASON, engine))
        .collect();

    info!(user_id = %user_id, count = recommendations.len(), "Generated popular recommendations");
    Ok(recommendations)
}

/// Recommends articles close to the embedding centroid of the user's highly rated reads,
/// falling back to popularity when there is no such history.
pub struct ContentBasedEngine {
    articles: Arc<dyn ArticleStorage>,
    ratings: Arc<dyn RatingStorage>,
    similarity: Arc<dyn SimilarityStorage>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl ContentBasedEngine {
    pub fn new(
        articles: Arc<dyn ArticleStorage>,
        ratings: Arc<dyn RatingStorage>,
        similarity: Arc<dyn SimilarityStorage>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            articles,
            ratings,
            similarity,
            embeddings,
        }
    }

    /// Profile texts and weights from the user's highly rated articles
    async fn rated_texts(&self, user_id: Uuid) -> Result<(Vec<String>, Vec<f32>)> {
        let ratings = self.ratings.find_by_user(user_id).await?;

        let mut texts = Vec::new();
        let mut weights = Vec::new();
        for rating in ratings.iter().filter(|r| is_high_rating(r.score)) {
            let article = match self.articles.get_article(rating.article_id).await {
                Ok(article) => article,
                Err(e) => {
                    warn!(user_id = %user_id, "Skipping rated article {}: {}", rating.article_id, e);
                    continue;
                }
            };

            let text = article.profile_text();
            if text.is_empty() {
                continue;
            }
            texts.push(text);
            weights.push(rating_weight(rating.score));
        }
        Ok((texts, weights))
    }
}

#[async_trait]
impl Engine for ContentBasedEngine {
    fn name(&self) -> &str {
        CONTENT_BASED_ENGINE
    }

    async fn recommend(&self, user_id: Uuid, limit: usize) -> Result<Vec<RecommendedArticle>> {
        info!(user_id = %user_id, limit, "Generating content-based recommendations");

        let (texts, weights) = self.rated_texts(user_id).await?;
        if texts.is_empty() {
            debug!(user_id = %user_id, "No rating history, using popular articles");
            return popular_recommendations(self.articles.as_ref(), user_id, limit, self.name()).await;
        }

        let embeddings = self.embeddings.embed_batch(&texts).await?;
        let Some(profile) = weighted_profile(&embeddings, &weights)? else {
            debug!(user_id = %user_id, "Could not build a profile, using popular articles");
            return popular_recommendations(self.articles.as_ref(), user_id, limit, self.name()).await;
        };

        let similar = self
            .similarity
            .find_similar(&profile, user_id, limit.saturating_mul(2))
            .await?;
        if similar.is_empty() {
            info!(user_id = %user_id, "No similar articles found");
            return Ok(Vec::new());
        }

        let recommendations: Vec<_> = similar
            .into_iter()
            .filter(|article| !article.is_owned_by(user_id))
            .take(limit)
            .map(|article| wrap(article, CONTENT_BASED_SCORE, CONTENT_BASED_REASON, self.name()))
            .collect();

        info!(
            user_id = %user_id,
            profile_size = texts.len(),
            count = recommendations.len(),
            "Generated content-based recommendations"
        );
        Ok(recommendations)
    }
}

/// Ranks purely by rating popularity
pub struct PopularityEngine {
    articles: Arc<dyn ArticleStorage>,
}

impl PopularityEngine {
    pub fn new(articles: Arc<dyn ArticleStorage>) -> Self {
        Self { articles }
    }
}

#[async_trait]
impl Engine for PopularityEngine {
    fn name(&self) -> &str {
        POPULARITY_ENGINE
    }

    async fn recommend(&self, user_id: Uuid, limit: usize) -> Result<Vec<RecommendedArticle>> {
        popular_recommendations(self.articles.as_ref(), user_id, limit, self.name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{ProcessingStatus, Rating};
    use shelf_inference::HashEmbedder;
    use shelf_storage::InMemoryStorage;

    async fn published(storage: &InMemoryStorage, owner: Uuid, title: &str, embedding: Option<Vec<f32>>) -> Article {
        let mut article = Article::new(owner, format!("https://example.com/{}", title));
        article.title = title.to_string();
        article.metadata_status = ProcessingStatus::Success;
        if embedding.is_some() {
            article.embedding_status = ProcessingStatus::Success;
        }
        article.embedding = embedding;
        storage.create_article(&article).await.unwrap();
        article
    }

    fn engine(storage: &Arc<InMemoryStorage>) -> ContentBasedEngine {
        ContentBasedEngine::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            Arc::new(HashEmbedder::new(8).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_popular_fallback_without_history() {
        let storage = Arc::new(InMemoryStorage::new());
        let user = Uuid::new_v4();
        published(&storage, user, "mine", None).await;
        let other = published(&storage, Uuid::new_v4(), "theirs", None).await;

        let recommendations = engine(&storage).recommend(user, 10).await.unwrap();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].article.id, other.id);
        assert_eq!(recommendations[0].score, POPULARITY_SCORE);
        assert_eq!(recommendations[0].reason, POPULARITY_REASON);
        assert_eq!(recommendations[0].recommender_used, CONTENT_BASED_ENGINE);
    }

    #[tokio::test]
    async fn test_content_based_uses_similarity() {
        let storage = Arc::new(InMemoryStorage::new());
        let embedder = HashEmbedder::new(8).unwrap();
        let user = Uuid::new_v4();
        let author = Uuid::new_v4();

        let liked = published(&storage, author, "rust", None).await;
        storage.upsert_rating(&Rating::new(user, liked.id, 5)).await.unwrap();

        let profile = embedder.embed("rust").await.unwrap();
        let candidate = published(&storage, author, "candidate", Some(profile.clone())).await;
        published(&storage, user, "own", Some(profile)).await;

        let recommendations = engine(&storage).recommend(user, 5).await.unwrap();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].article.id, candidate.id);
        assert_eq!(recommendations[0].score, CONTENT_BASED_SCORE);
        assert_eq!(recommendations[0].reason, CONTENT_BASED_REASON);
    }

    #[tokio::test]
    async fn test_popularity_engine_respects_limit() {
        let storage = Arc::new(InMemoryStorage::new());
        for i in 0..5 {
            published(&storage, Uuid::new_v4(), &format!("a{}", i), None).await;
        }

        let popularity = PopularityEngine::new(storage.clone());
        let recommendations = popularity.recommend(Uuid::new_v4(), 3).await.unwrap();
        assert_eq!(recommendations.len(), 3);
        assert!(recommendations.iter().all(|r| r.recommender_used == POPULARITY_ENGINE));
    }
}
