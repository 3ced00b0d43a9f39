use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_core::{Article, Rating, RecommendedArticle};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

pub const DEFAULT_RECOMMENDATION_LIMIT: i64 = 10;
const MAX_RECOMMENDATION_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RateArticleRequest {
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendedArticle>,
    pub generated_at: DateTime<Utc>,
    pub engine_used: String,
    pub user_id: Uuid,
    pub count: usize,
}

/// Absent, unparsable or out-of-range limits fall back to the default
pub fn parse_recommendation_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|limit| (1..=MAX_RECOMMENDATION_LIMIT).contains(limit))
        .unwrap_or(DEFAULT_RECOMMENDATION_LIMIT)
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.embeddings.health().await {
        Ok(embedding) => Json(json!({ "status": "ok", "embedding": embedding })),
        Err(e) => {
            warn!("Embedding provider health check failed: {}", e);
            Json(json!({ "status": "degraded", "embedding": null }))
        }
    }
}

pub async fn create_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<CreateArticleRequest>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    // Extraction continues in the background
    let (article, _ticket) = state.articles.create_article(user_id, &request.url).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListArticlesQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .articles
        .list_user_articles(user_id, query.page.unwrap_or(1), query.limit.unwrap_or(0))
        .await?;
    Ok(Json(page))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.articles.get_article(id, user_id).await?))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.articles.delete_article(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rate_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RateArticleRequest>,
) -> ApiResult<Json<Rating>> {
    Ok(Json(state.ratings.rate_article(user_id, id, request.score).await?))
}

pub async fn get_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Rating>> {
    Ok(Json(state.ratings.get_rating(user_id, id).await?))
}

pub async fn delete_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.ratings.delete_rating(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<RecommendationResponse>> {
    let limit = parse_recommendation_limit(query.limit.as_deref());
    let recommendations = state.recommendations.get_recommendations(user_id, limit).await?;

    Ok(Json(RecommendationResponse {
        count: recommendations.len(),
        recommendations,
        generated_at: Utc::now(),
        engine_used: state.recommendations.engine_name().to_string(),
        user_id,
    }))
}
