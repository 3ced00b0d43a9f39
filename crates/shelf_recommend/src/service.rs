use serde::{Deserialize, Serialize};
use shelf_core::{
    ArticleStorage, EmbeddingProvider, Error, RatingStorage, RecommendedArticle, Result, SimilarityStorage,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::{ContentBasedEngine, Engine, PopularityEngine, CONTENT_BASED_ENGINE, POPULARITY_ENGINE};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Scores at or above this are reported as strong matches
pub const HIGH_CONFIDENCE: f64 = 0.8;
/// Scores below this are reported as weak matches
pub const LOW_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    #[default]
    ContentBased,
    Popularity,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::ContentBased => CONTENT_BASED_ENGINE,
            EngineKind::Popularity => POPULARITY_ENGINE,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            CONTENT_BASED_ENGINE => Ok(EngineKind::ContentBased),
            POPULARITY_ENGINE => Ok(EngineKind::Popularity),
            other => Err(Error::InvalidInput(format!(
                "unknown recommendation engine '{}' (available: {}, {})",
                other, CONTENT_BASED_ENGINE, POPULARITY_ENGINE
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecommenderConfig {
    pub engine: EngineKind,
    /// Upper bound on one request; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

/// Store and provider handles an engine is built from
#[derive(Clone)]
pub struct EngineContext {
    pub articles: Arc<dyn ArticleStorage>,
    pub ratings: Arc<dyn RatingStorage>,
    pub similarity: Arc<dyn SimilarityStorage>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
}

pub fn build_engine(kind: EngineKind, context: EngineContext) -> Arc<dyn Engine> {
    match kind {
        EngineKind::ContentBased => Arc::new(ContentBasedEngine::new(
            context.articles,
            context.ratings,
            context.similarity,
            context.embeddings,
        )),
        EngineKind::Popularity => Arc::new(PopularityEngine::new(context.articles)),
    }
}

/// Requested limit mapped into 1..=100; anything below 1 means the default
pub fn clamp_limit(limit: i64) -> usize {
    if limit < 1 {
        DEFAULT_LIMIT
    } else {
        (limit as u64).min(MAX_LIMIT as u64) as usize
    }
}

/// Prefix the reason according to the score band
pub fn annotate_reason(recommendation: &mut RecommendedArticle) {
    if recommendation.score >= HIGH_CONFIDENCE {
        recommendation.reason = format!("Highly {}", recommendation.reason);
    } else if recommendation.score < LOW_CONFIDENCE {
        recommendation.reason = format!("Potentially {}", recommendation.reason);
    }
}

pub struct RecommendationService {
    engine: Arc<dyn Engine>,
    timeout: Option<Duration>,
}

impl RecommendationService {
    pub fn new(config: RecommenderConfig, context: EngineContext) -> Self {
        Self::with_engine(build_engine(config.engine, context), config.timeout)
    }

    pub fn with_engine(engine: Arc<dyn Engine>, timeout: Option<Duration>) -> Self {
        Self { engine, timeout }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub async fn get_recommendations(&self, user_id: Uuid, limit: i64) -> Result<Vec<RecommendedArticle>> {
        let limit = clamp_limit(limit);
        let request = self.engine.recommend(user_id, limit);

        let outcome = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, request).await.map_err(|_| {
                error!(user_id = %user_id, "Recommendation request timed out after {:?}", timeout);
                Error::Timeout(timeout)
            })?,
            None => request.await,
        };

        let mut recommendations = outcome.map_err(|e| {
            error!(user_id = %user_id, engine = self.engine.name(), "Recommendation failed: {}", e);
            Error::Recommendation(format!(
                "{} engine failed for user {}: {}",
                self.engine.name(),
                user_id,
                e
            ))
        })?;

        recommendations.iter_mut().for_each(annotate_reason);
        info!(user_id = %user_id, count = recommendations.len(), "Served recommendations");
        Ok(recommendations)
    }
}
