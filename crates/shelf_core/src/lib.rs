pub mod config;
pub mod error;
pub mod models;
pub mod popularity;
pub mod storage;
pub mod types;
pub mod vector;

pub use error::{Error, Result};
pub use models::EmbeddingProvider;
pub use storage::{ArticleStorage, RatingStorage, SimilarityStorage};
pub use types::{
    Article, Classification, ProcessingStatus, ProviderHealth, Rating, RatingStats, RecommendedArticle, User,
};

pub mod prelude {
    pub use super::{Article, Error, ProcessingStatus, Rating, RecommendedArticle, Result};
    pub use super::{ArticleStorage, EmbeddingProvider, RatingStorage, SimilarityStorage};
}
