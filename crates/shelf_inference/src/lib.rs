pub mod embeddings;
pub mod models;

pub use embeddings::ArticleEmbedder;
pub use models::{create_provider, HashEmbedder, HttpEmbeddingClient};

pub mod prelude {
    pub use super::embeddings::ArticleEmbedder;
    pub use super::models::{create_provider, HashEmbedder, HttpEmbeddingClient};
    pub use shelf_core::{EmbeddingProvider, Error, Result};
}
