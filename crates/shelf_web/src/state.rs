use shelf_articles::{ArticleService, RatingService};
use shelf_core::EmbeddingProvider;
use shelf_recommend::RecommendationService;
use std::sync::Arc;

use crate::auth::JwtKeys;

pub struct AppState {
    pub articles: Arc<ArticleService>,
    pub ratings: Arc<RatingService>,
    pub recommendations: Arc<RecommendationService>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub auth: Arc<JwtKeys>,
}
