use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use shelf_core::config::EmbeddingConfig;
use shelf_core::vector::ensure_same_dimension;
use shelf_core::{Classification, EmbeddingProvider, Error, ProviderHealth, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct SimilarityRequest<'a> {
    embedding1: &'a [f32],
    embedding2: &'a [f32],
}

#[derive(Deserialize)]
struct SimilarityResponse {
    similarity: f32,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    is_article: bool,
    confidence: f64,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    embedding_model: String,
    #[serde(default)]
    embedding_model_loaded: bool,
}

/// Client for the external embedding service.
pub struct HttpEmbeddingClient {
    client: Arc<Client>,
    base_url: Url,
    dimension: usize,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.service_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", config.service_url, e)))?;
        // Endpoints are joined relative to the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
            base_url,
            dimension: config.dimension,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for HttpEmbeddingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEmbeddingClient")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url.as_str())
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Turn a non-2xx answer into an inference error carrying the body text
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Inference(format!(
        "embedding service error (status {}): {}",
        status.as_u16(),
        body
    )))
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    fn name(&self) -> &str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("empty text provided".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint("embed")?)
            .json(&EmbedRequest { text })
            .send()
            .await?;
        let response = check_status(response).await?.json::<EmbedResponse>().await?;

        self.check_dimension(&response.embedding)?;
        Ok(response.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Requesting {} embeddings from {}", texts.len(), self.base_url);

        let response = self
            .client
            .post(self.endpoint("embed/batch")?)
            .json(&BatchEmbedRequest { texts })
            .send()
            .await?;
        let response = check_status(response).await?.json::<BatchEmbedResponse>().await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::Inference(format!(
                "embedding service returned {} embeddings for {} texts",
                response.embeddings.len(),
                texts.len()
            )));
        }
        for embedding in &response.embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(response.embeddings)
    }

    async fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        ensure_same_dimension(a, b)?;

        let response = self
            .client
            .post(self.endpoint("similarity")?)
            .json(&SimilarityRequest {
                embedding1: a,
                embedding2: b,
            })
            .send()
            .await?;
        let response = check_status(response).await?.json::<SimilarityResponse>().await?;
        Ok(response.similarity)
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        if text.is_empty() {
            return Err(Error::InvalidInput("empty text provided".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint("classify")?)
            .json(&ClassifyRequest { text })
            .send()
            .await?;
        let response = check_status(response).await?.json::<ClassifyResponse>().await?;
        Ok(Classification {
            is_article: response.is_article,
            confidence: response.confidence,
        })
    }

    async fn health(&self) -> Result<ProviderHealth> {
        let response = self.client.get(self.endpoint("health")?).send().await?;
        let response = check_status(response).await?.json::<HealthResponse>().await?;
        Ok(ProviderHealth {
            status: response.status,
            embedding_model: response.embedding_model,
            embedding_model_loaded: response.embedding_model_loaded,
        })
    }
}
