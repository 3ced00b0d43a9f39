use shelf_core::config::EmbeddingConfig;
use shelf_core::{EmbeddingProvider, Error, Result};
use std::sync::Arc;
use tracing::info;

pub mod hashing;
pub mod http;

pub use hashing::HashEmbedder;
pub use http::HttpEmbeddingClient;

pub const PROVIDERS: &[&str] = &["http", "hashing"];

/// Build the named embedding provider from configuration
pub fn create_provider(kind: &str, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match kind {
        "http" => Arc::new(HttpEmbeddingClient::new(config)?),
        "hashing" => Arc::new(HashEmbedder::new(config.dimension)?),
        other => {
            return Err(Error::InvalidInput(format!(
                "unknown embedding provider '{}' (available: {})",
                other,
                PROVIDERS.join(", ")
            )))
        }
    };
    info!("Using {} embedding provider ({} dimensions)", provider.name(), provider.dimension());
    Ok(provider)
}
