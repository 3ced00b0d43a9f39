use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use auth::{AuthUser, Claims, JwtKeys};
pub use error::{ApiError, ApiResult};
pub use handlers::RecommendationResponse;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/articles",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route(
            "/api/articles/:id",
            get(handlers::get_article).delete(handlers::delete_article),
        )
        .route(
            "/api/articles/:id/rating",
            put(handlers::rate_article)
                .get(handlers::get_rating)
                .delete(handlers::delete_rating),
        )
        .route("/api/recommendations", get(handlers::get_recommendations))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use shelf_core::{Article, Error, Result};
    pub use crate::{create_app, AppState};
}
