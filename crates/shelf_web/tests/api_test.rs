use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shelf_articles::{
    ArticlePipeline, ArticleProcessor, ArticleService, ExtractedMetadata, MetadataExtractor, RatingService,
};
use shelf_core::{ArticleStorage, ProcessingStatus, Result};
use shelf_inference::{ArticleEmbedder, HashEmbedder};
use shelf_recommend::{EngineContext, RecommendationService, RecommenderConfig};
use shelf_storage::InMemoryStorage;
use shelf_web::{create_app, AppState, JwtKeys};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

struct StaticExtractor;

#[async_trait]
impl MetadataExtractor for StaticExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedMetadata> {
        Ok(ExtractedMetadata {
            title: format!("Title of {}", url),
            description: "Description".to_string(),
            content: "Some body text".to_string(),
            image_url: None,
            word_count: 3,
            confidence: 0.9,
        })
    }
}

const SECRET: &str = "test-secret";

fn keys() -> JwtKeys {
    JwtKeys::new(SECRET, Duration::from_secs(3600)).unwrap()
}

fn bearer(user: Uuid) -> String {
    format!("Bearer {}", keys().issue(user, None).unwrap())
}

fn app(storage: &Arc<InMemoryStorage>) -> Router {
    let embeddings = Arc::new(HashEmbedder::new(16).unwrap());
    let processor = Arc::new(ArticleProcessor::new(
        storage.clone(),
        storage.clone(),
        Arc::new(StaticExtractor),
        ArticleEmbedder::new(embeddings.clone()),
    ));
    let pipeline = Arc::new(ArticlePipeline::start(processor, 1));

    let state = AppState {
        articles: Arc::new(ArticleService::new(storage.clone(), storage.clone(), pipeline)),
        ratings: Arc::new(RatingService::new(storage.clone(), storage.clone())),
        recommendations: Arc::new(RecommendationService::new(
            RecommenderConfig::default(),
            EngineContext {
                articles: storage.clone(),
                ratings: storage.clone(),
                similarity: storage.clone(),
                embeddings: embeddings.clone(),
            },
        )),
        embeddings,
        auth: Arc::new(keys()),
    };
    create_app(state)
}

async fn send(app: &Router, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("authorization", bearer(user));
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn published(storage: &InMemoryStorage, owner: Uuid, title: &str) -> Uuid {
    let mut article = shelf_core::Article::new(owner, format!("https://example.com/{}", title));
    article.title = title.to_string();
    article.metadata_status = ProcessingStatus::Success;
    storage.create_article(&article).await.unwrap();
    article.id
}

async fn status_with_authorization(app: &Router, value: &str) -> StatusCode {
    let request = Request::builder()
        .uri("/api/recommendations")
        .header("authorization", value)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_missing_or_invalid_identity_is_unauthorized() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);

    let (status, body) = send(&app, Method::GET, "/api/recommendations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let user = Uuid::new_v4();
    let token = keys().issue(user, None).unwrap();
    assert_eq!(status_with_authorization(&app, &token).await, StatusCode::UNAUTHORIZED);
    assert_eq!(status_with_authorization(&app, "Bearer not-a-jwt").await, StatusCode::UNAUTHORIZED);

    let forged = JwtKeys::new("someone-else", Duration::from_secs(3600))
        .unwrap()
        .issue(user, None)
        .unwrap();
    assert_eq!(
        status_with_authorization(&app, &format!("Bearer {}", forged)).await,
        StatusCode::UNAUTHORIZED
    );

    // Swap the payload for another user's while keeping the original signature
    let other = keys().issue(Uuid::new_v4(), None).unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    let other_parts: Vec<&str> = other.split('.').collect();
    let tampered = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
    assert_eq!(
        status_with_authorization(&app, &format!("Bearer {}", tampered)).await,
        StatusCode::UNAUTHORIZED
    );

    assert_eq!(status_with_authorization(&app, &format!("Bearer {}", token)).await, StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_embedding_provider() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["embedding"].is_object());
}

#[tokio::test]
async fn test_create_and_fetch_article() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);
    let owner = Uuid::new_v4();

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/articles",
        Some(owner),
        Some(json!({ "url": "https://example.com/post" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, Method::GET, &format!("/api/articles/{}", id), Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["url"], "https://example.com/post");

    let (status, _) = send(&app, Method::GET, &format!("/api/articles/{}", id), Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = send(&app, Method::GET, "/api/articles?page=1&limit=5", Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
}

#[tokio::test]
async fn test_invalid_url_is_bad_request() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/articles",
        Some(Uuid::new_v4()),
        Some(json!({ "url": "ftp://example.com/file" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rating_rules() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);
    let owner = Uuid::new_v4();
    let reader = Uuid::new_v4();
    let id = published(&storage, owner, "rated").await;
    let path = format!("/api/articles/{}/rating", id);

    let (status, _) = send(&app, Method::PUT, &path, Some(owner), Some(json!({ "score": 5 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::PUT, &path, Some(reader), Some(json!({ "score": 9 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, rating) = send(&app, Method::PUT, &path, Some(reader), Some(json!({ "score": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rating["score"], 4);

    let (status, rating) = send(&app, Method::GET, &path, Some(reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rating["score"], 4);

    let (status, _) = send(&app, Method::DELETE, &path, Some(reader), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &path, Some(reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommendations_response_shape() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);
    let user = Uuid::new_v4();
    for i in 0..4 {
        published(&storage, Uuid::new_v4(), &format!("other-{}", i)).await;
    }
    published(&storage, user, "mine").await;

    let (status, body) = send(&app, Method::GET, "/api/recommendations?limit=3", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 3);
    assert_eq!(body["count"], 3);
    assert_eq!(body["engine_used"], "content-based");
    assert_eq!(body["user_id"], user.to_string());
    assert!(body["generated_at"].is_string());
    for r in recommendations {
        assert_ne!(r["article"]["user_id"], user.to_string());
    }

    let (status, body) = send(&app, Method::GET, "/api/recommendations?limit=abc", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
}

#[tokio::test]
async fn test_delete_article() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&storage);
    let owner = Uuid::new_v4();
    let id = published(&storage, owner, "gone").await;
    let path = format!("/api/articles/{}", id);

    let (status, _) = send(&app, Method::DELETE, &path, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &path, Some(owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &path, Some(owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
