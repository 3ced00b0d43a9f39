use async_trait::async_trait;
use chrono::Utc;
use shelf_core::popularity::rank_popular;
use shelf_core::{
    Article, ArticleStorage, Error, ProcessingStatus, Rating, RatingStats, RatingStorage, Result, SimilarityStorage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::rank_by_similarity;
use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    ratings: HashMap<(Uuid, Uuid), Rating>,
}

impl MemoryStore {
    fn article(&self, id: Uuid) -> Result<&Article> {
        self.articles
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))
    }

    fn article_mut(&mut self, id: Uuid) -> Result<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))
    }

    fn stats(&self, article_id: Uuid) -> RatingStats {
        let scores: Vec<i32> = self
            .ratings
            .values()
            .filter(|r| r.article_id == article_id)
            .map(|r| r.score)
            .collect();
        if scores.is_empty() {
            return RatingStats::default();
        }
        RatingStats {
            average: scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64,
            count: scores.len(),
        }
    }

    fn upsert_rating(&mut self, rating: &Rating) -> Rating {
        let key = (rating.user_id, rating.article_id);
        let stored = self
            .ratings
            .entry(key)
            .and_modify(|existing| {
                existing.score = rating.score;
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| rating.clone());
        stored.clone()
    }
}

/// Process-local storage for tests and single-node runs.
///
/// Similarity search is a linear scan over cosine similarity.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn new() -> Result<Self> where Self: Sized {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn create_article(&self, article: &Article) -> Result<()> {
        let mut store = self.store.write().await;
        if store.articles.iter().any(|a| a.id == article.id) {
            return Err(Error::Storage(format!("article {} already exists", article.id)));
        }
        store.articles.push(article.clone());
        Ok(())
    }

    async fn get_article(&self, id: Uuid) -> Result<Article> {
        let store = self.store.read().await;
        store.article(id).cloned()
    }

    async fn update_article(&self, article: &Article) -> Result<()> {
        let mut store = self.store.write().await;
        let existing = store.article_mut(article.id)?;
        *existing = article.clone();
        Ok(())
    }

    async fn delete_article(&self, id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        let before = store.articles.len();
        store.articles.retain(|a| a.id != id);
        if store.articles.len() == before {
            return Err(Error::NotFound(format!("article {}", id)));
        }
        store.ratings.retain(|(_, article_id), _| *article_id != id);
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut articles: Vec<Article> = store
            .articles
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<usize> {
        let store = self.store.read().await;
        Ok(store.articles.iter().filter(|a| a.user_id == user_id).count())
    }

    async fn find_failed_metadata(&self, max_retries: i32) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut failed: Vec<Article> = store
            .articles
            .iter()
            .filter(|a| a.metadata_status == ProcessingStatus::Failed && a.retry_count < max_retries)
            .cloned()
            .collect();
        failed.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(failed)
    }

    async fn find_popular(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let candidates = store
            .articles
            .iter()
            .filter(|a| a.metadata_status == ProcessingStatus::Success)
            .map(|a| (a.clone(), store.stats(a.id)))
            .collect();
        Ok(rank_popular(candidates).into_iter().take(limit).collect())
    }
}

#[async_trait]
impl RatingStorage for InMemoryStorage {
    async fn upsert_rating(&self, rating: &Rating) -> Result<Rating> {
        let mut store = self.store.write().await;
        Ok(store.upsert_rating(rating))
    }

    async fn get_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<Option<Rating>> {
        let store = self.store.read().await;
        Ok(store.ratings.get(&(user_id, article_id)).cloned())
    }

    async fn delete_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .ratings
            .remove(&(user_id, article_id))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("rating".to_string()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Rating>> {
        let store = self.store.read().await;
        let mut ratings: Vec<Rating> = store
            .ratings
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.article_id.cmp(&b.article_id)));
        Ok(ratings)
    }

    async fn average_and_count(&self, article_id: Uuid) -> Result<RatingStats> {
        let store = self.store.read().await;
        Ok(store.stats(article_id))
    }
}

#[async_trait]
impl SimilarityStorage for InMemoryStorage {
    async fn index_article(&self, article: &Article) -> Result<()> {
        let mut store = self.store.write().await;
        let existing = store.article_mut(article.id)?;
        existing.embedding = article.embedding.clone();
        existing.embedding_status = article.embedding_status;
        Ok(())
    }

    async fn remove_article(&self, article_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        if let Ok(existing) = store.article_mut(article_id) {
            existing.embedding = None;
            existing.embedding_status = ProcessingStatus::Pending;
        }
        Ok(())
    }

    async fn find_similar(&self, query: &[f32], exclude_owner: Uuid, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let candidates = store
            .articles
            .iter()
            .filter(|a| a.user_id != exclude_owner)
            .cloned()
            .collect();
        Ok(rank_by_similarity(query, candidates, limit))
    }
}
