use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        vectors_config::Config, Condition, CreateCollection, DeletePointsBuilder, Distance, Filter, PointStruct,
        PointsIdsList, SearchPoints, UpsertPoints, VectorParams, Vectors, VectorsConfig, WithPayloadSelector,
    },
    Qdrant,
};
use shelf_core::config::QdrantSettings;
use shelf_core::{Article, Error, ProcessingStatus, Result, SimilarityStorage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{BackendConfig, StorageBackend};

const DEFAULT_HOST: &str = "qdrant";
const DEFAULT_COLLECTION: &str = "articles";
const DEFAULT_VECTOR_SIZE: u64 = 384;

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub vector_size: u64,
}

impl QdrantConfig {
    pub fn new(host: &str, collection: &str, vector_size: u64) -> Self {
        Self {
            url: format!("http://{}:6334", host),
            collection: collection.to_string(),
            vector_size,
        }
    }

    pub fn from_settings(settings: &QdrantSettings, vector_size: usize) -> Self {
        Self::new(
            settings.host.as_deref().unwrap_or(DEFAULT_HOST),
            &settings.collection,
            vector_size as u64,
        )
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_COLLECTION, DEFAULT_VECTOR_SIZE)
    }
}

impl BackendConfig for QdrantConfig {
    fn get_url(&self) -> String {
        self.url.clone()
    }

    fn get_collection(&self) -> String {
        self.collection.clone()
    }

    fn get_vector_size(&self) -> u64 {
        self.vector_size
    }
}

/// Similarity index backed by a Qdrant collection.
///
/// Points are keyed by article id and carry the serialized article as payload, so the
/// relational store stays the source of truth and this index can be rebuilt from it.
pub struct QdrantStorage {
    client: Arc<Qdrant>,
    collection_name: String,
}

fn external(e: impl Into<anyhow::Error>) -> Error {
    Error::External(e.into())
}

impl QdrantStorage {
    pub async fn with_config(config: &dyn BackendConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.get_url()).build().map_err(external)?;
        let client = Arc::new(client);
        let collection_name = config.get_collection();

        let collections = client.list_collections().await.map_err(external)?;
        if !collections.collections.iter().any(|c| c.name == collection_name) {
            let vector_config = VectorsConfig {
                config: Some(Config::Params(VectorParams {
                    size: config.get_vector_size(),
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                })),
            };

            client
                .create_collection(CreateCollection {
                    collection_name: collection_name.clone(),
                    vectors_config: Some(vector_config),
                    ..Default::default()
                })
                .await
                .map_err(external)?;
            info!("Created Qdrant collection '{}'", collection_name);
        }

        Ok(Self {
            client,
            collection_name,
        })
    }
}

#[async_trait]
impl StorageBackend for QdrantStorage {
    async fn new() -> Result<Self> where Self: Sized {
        Self::with_config(&QdrantConfig::default()).await
    }
}

#[async_trait]
impl SimilarityStorage for QdrantStorage {
    async fn index_article(&self, article: &Article) -> Result<()> {
        let embedding = match article.embedding.as_ref() {
            Some(embedding) if article.is_recommendable() => embedding.clone(),
            _ => return self.remove_article(article.id).await,
        };

        let doc_str = serde_json::to_string(article)?;
        let mut payload = HashMap::new();
        payload.insert("user_id".to_string(), article.user_id.to_string().into());
        payload.insert("metadata_status".to_string(), article.metadata_status.as_str().to_string().into());
        payload.insert("embedding_status".to_string(), article.embedding_status.as_str().to_string().into());
        payload.insert("doc".to_string(), doc_str.into());

        let point = PointStruct {
            id: Some(article.id.to_string().into()),
            vectors: Some(Vectors::from(embedding)),
            payload,
        };

        self.client
            .upsert_points(UpsertPoints {
                collection_name: self.collection_name.clone(),
                points: vec![point],
                ..Default::default()
            })
            .await
            .map_err(external)?;

        Ok(())
    }

    async fn remove_article(&self, article_id: Uuid) -> Result<()> {
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection_name).points(PointsIdsList {
                ids: vec![article_id.to_string().into()],
            }))
            .await
            .map_err(external)?;
        Ok(())
    }

    async fn find_similar(&self, query: &[f32], exclude_owner: Uuid, limit: usize) -> Result<Vec<Article>> {
        let success = ProcessingStatus::Success.as_str().to_string();
        let search_request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query.to_vec(),
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector::from(true)),
            filter: Some(Filter {
                must: vec![
                    Condition::matches("metadata_status", success.clone()),
                    Condition::matches("embedding_status", success),
                ],
                must_not: vec![Condition::matches("user_id", exclude_owner.to_string())],
                ..Default::default()
            }),
            ..Default::default()
        };

        let results = self.client.search_points(search_request).await.map_err(external)?;

        let mut articles = Vec::new();
        for point in results.result {
            let Some(doc_str) = point.payload.get("doc").and_then(|v| v.as_str()) else {
                continue;
            };
            match serde_json::from_str::<Article>(doc_str) {
                Ok(article) => articles.push(article),
                Err(e) => debug!("Skipping unreadable Qdrant payload: {}", e),
            }
        }

        Ok(articles)
    }
}
