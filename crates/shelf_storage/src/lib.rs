use async_trait::async_trait;
use shelf_core::{ArticleStorage, Error, RatingStorage, Result, SimilarityStorage};
use std::fmt;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn new() -> Result<Self> where Self: Sized;
}

pub trait BackendConfig: fmt::Debug + Send + Sync {
    fn get_url(&self) -> String;
    fn get_collection(&self) -> String;
    fn get_vector_size(&self) -> u64;
}

/// The three store handles the services work against.
///
/// A single backend usually serves all of them; the similarity store can be swapped
/// for a dedicated vector database.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleStorage>,
    pub ratings: Arc<dyn RatingStorage>,
    pub similarity: Arc<dyn SimilarityStorage>,
}

impl Stores {
    pub fn from_backend<T>(backend: T) -> Self
    where
        T: ArticleStorage + RatingStorage + SimilarityStorage + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            ratings: backend.clone(),
            similarity: backend,
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityStorage>) -> Self {
        self.similarity = similarity;
        self
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the named backend. `url` is only used by backends that connect somewhere.
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Stores> {
    match kind {
        "memory" => Ok(Stores::from_backend(InMemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match url {
                Some(url) => SQLiteStorage::connect(url).await?,
                None => <SQLiteStorage as StorageBackend>::new().await?,
            };
            Ok(Stores::from_backend(storage))
        }
        other => {
            let _ = url;
            Err(Error::InvalidInput(format!(
                "unknown storage backend '{}' (available: {})",
                other,
                available_backends().join(", ")
            )))
        }
    }
}

pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["memory"];
    if cfg!(feature = "sqlite") {
        backends.push("sqlite");
    }
    backends
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, BackendConfig, StorageBackend, Stores};
}
