use clap::Parser;
use shelf_articles::{
    init_logging, ArticlePipeline, ArticleProcessor, ArticleService, HtmlMetadataExtractor, RatingService, RetryJob,
    RetryWorker,
};
use shelf_core::config::{parse_duration, Config};
use shelf_core::{Article, EmbeddingProvider, Error, Result};
use shelf_inference::{create_provider, ArticleEmbedder};
use shelf_recommend::{EngineContext, EngineKind, RecommendationService, RecommenderConfig};
use shelf_storage::Stores;
use shelf_web::{create_app, AppState, JwtKeys};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

const CHECK_URL: &str = "http://shelf.invalid/storage-check";

#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_duration(s).map(HumanDuration)
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Article shelf and recommendation service", long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "memory", help = "Storage backend: memory or sqlite")]
    storage: String,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    embedding_url: Option<String>,
    #[arg(long, help = "Use the local hashing embedder instead of the embedding service")]
    offline_embeddings: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API together with the background workers
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// Interval between retry sweeps (e.g. 30s, 5m, 1h15m30s)
        #[arg(long)]
        retry_interval: Option<HumanDuration>,
        #[arg(long, default_value = "content-based")]
        engine: EngineKind,
    },
    /// Print recommendations for one user as JSON
    Recommend {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value = "content-based")]
        engine: EngineKind,
    },
    /// Run one sweep over articles whose metadata extraction failed
    Retry,
    /// Issue a bearer token for an existing user id
    Token {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        email: Option<String>,
    },
}

/// Write, read back and remove a throwaway article
async fn check_storage(stores: &Stores, storage_type: &str) -> Result<()> {
    let marker = Article::new(Uuid::nil(), CHECK_URL);
    stores.articles.create_article(&marker).await?;

    let stored = stores.articles.get_article(marker.id).await?;
    if stored.url != marker.url {
        return Err(Error::Storage("Failed to retrieve check article".to_string()));
    }

    if let Err(e) = stores.articles.delete_article(marker.id).await {
        warn!("Failed to clean up check article: {}", e);
    }

    info!("Storage backend initialized successfully (using {})", storage_type);
    Ok(())
}

async fn check_storage_with_retry(
    stores: &Stores,
    storage_type: &str,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < max_retries {
        match tokio::time::timeout(timeout, check_storage(stores, storage_type)).await {
            Ok(result) => return result,
            Err(_) => {
                last_error = Some(Error::Timeout(timeout));
                retries += 1;
                if retries < max_retries {
                    info!("Storage health check timed out, retrying {}/{}...", retries, max_retries);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Storage("Storage health check failed after all retries".to_string())))
}

async fn open_storage(kind: &str, url: Option<&str>) -> Result<Stores> {
    let mut retries = 3;
    let mut last_error = None;

    while retries > 0 {
        let attempt = match shelf_storage::create_storage(kind, url).await {
            Ok(stores) => check_storage_with_retry(&stores, kind, 3, Duration::from_secs(10))
                .await
                .map(|_| stores),
            Err(e @ Error::InvalidInput(_)) => return Err(e),
            Err(e) => Err(e),
        };

        match attempt {
            Ok(stores) => return Ok(stores),
            Err(e) => {
                last_error = Some(e);
                retries -= 1;
                if retries > 0 {
                    info!("Storage initialization failed, retrying {}/3...", 4 - retries);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Storage("Storage initialization failed after all retries".to_string())))
}

#[cfg(feature = "qdrant")]
async fn attach_vector_index(stores: Stores, config: &Config) -> Result<Stores> {
    use shelf_storage::backends::qdrant::QdrantConfig;
    use shelf_storage::QdrantStorage;

    if config.qdrant.host.is_none() {
        return Ok(stores);
    }
    let qdrant_config = QdrantConfig::from_settings(&config.qdrant, config.embedding.dimension);
    let index = QdrantStorage::with_config(&qdrant_config).await?;
    info!("Similarity search served by Qdrant at {}", qdrant_config.url);
    Ok(stores.with_similarity(Arc::new(index)))
}

#[cfg(not(feature = "qdrant"))]
async fn attach_vector_index(stores: Stores, config: &Config) -> Result<Stores> {
    if config.qdrant.host.is_some() {
        warn!("QDRANT_HOST is set but this build has no qdrant support; using the primary store");
    }
    Ok(stores)
}

/// Everything the subcommands share
struct Runtime {
    config: Config,
    stores: Stores,
    embeddings: Arc<dyn EmbeddingProvider>,
    processor: Arc<ArticleProcessor>,
}

impl Runtime {
    async fn build(cli: &Cli) -> Result<Self> {
        let mut config = Config::from_env()?;
        if let Some(url) = &cli.embedding_url {
            config.embedding.service_url = url.clone();
        }
        if let Some(url) = &cli.database_url {
            config.database.url = url.clone();
        }

        info!("Checking storage connection...");
        let database_url = (cli.storage != "memory").then_some(config.database.url.as_str());
        let stores = open_storage(&cli.storage, database_url).await?;
        let stores = attach_vector_index(stores, &config).await?;

        let provider_kind = if cli.offline_embeddings { "hashing" } else { "http" };
        let embeddings = create_provider(provider_kind, &config.embedding)?;
        info!("Embedding provider initialized (using {})", embeddings.name());

        let mut extractor = HtmlMetadataExtractor::new(&config.classifier)?;
        if !cli.offline_embeddings {
            extractor = extractor.with_classifier(embeddings.clone());
        }

        let processor = ArticleProcessor::new(
            stores.articles.clone(),
            stores.similarity.clone(),
            Arc::new(extractor),
            ArticleEmbedder::new(embeddings.clone()),
        )
        .with_max_retries(config.worker.max_retries);

        Ok(Self {
            config,
            stores,
            embeddings,
            processor: Arc::new(processor),
        })
    }

    fn jwt_keys(&self) -> Result<JwtKeys> {
        let secret = self
            .config
            .auth
            .jwt_secret
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("JWT_SECRET must be set".to_string()))?;
        JwtKeys::new(secret, self.config.auth.token_ttl)
    }

    fn recommendations(&self, engine: EngineKind) -> RecommendationService {
        RecommendationService::new(
            RecommenderConfig {
                engine,
                timeout: self.config.recommendation.timeout,
            },
            EngineContext {
                articles: self.stores.articles.clone(),
                ratings: self.stores.ratings.clone(),
                similarity: self.stores.similarity.clone(),
                embeddings: self.embeddings.clone(),
            },
        )
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

async fn serve(runtime: Runtime, port: Option<u16>, retry_interval: Option<Duration>, engine: EngineKind) -> Result<()> {
    let auth = Arc::new(runtime.jwt_keys()?);
    let pipeline = Arc::new(ArticlePipeline::start(
        runtime.processor.clone(),
        runtime.config.worker.concurrency,
    ));

    let job: Arc<dyn RetryJob> = runtime.processor.clone();
    let worker = RetryWorker::new(job, retry_interval.unwrap_or(runtime.config.worker.retry_interval))?;
    worker.start().await?;

    let state = AppState {
        articles: Arc::new(ArticleService::new(
            runtime.stores.articles.clone(),
            runtime.stores.similarity.clone(),
            pipeline.clone(),
        )),
        ratings: Arc::new(RatingService::new(
            runtime.stores.articles.clone(),
            runtime.stores.ratings.clone(),
        )),
        recommendations: Arc::new(runtime.recommendations(engine)),
        embeddings: runtime.embeddings.clone(),
        auth,
    };

    let port = port.unwrap_or(runtime.config.server.port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on {} (recommendations: {})", listener.local_addr()?, engine);

    let served = axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    worker.stop().await?;
    pipeline.shutdown().await?;
    served?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let runtime = Runtime::build(&cli).await?;

    match cli.command {
        Commands::Serve {
            port,
            retry_interval,
            engine,
        } => serve(runtime, port, retry_interval.map(|d| d.0), engine).await?,
        Commands::Recommend { user, limit, engine } => {
            let service = runtime.recommendations(engine);
            let recommendations = service.get_recommendations(user, limit).await?;
            info!("Generated {} recommendations with {}", recommendations.len(), service.engine_name());
            println!("{}", serde_json::to_string_pretty(&recommendations)?);
        }
        Commands::Retry => {
            let summary = runtime.processor.retry_failed_metadata().await?;
            println!(
                "Retried {} articles, {} succeeded",
                summary.attempted, summary.succeeded
            );
        }
        Commands::Token { user, email } => {
            println!("{}", runtime.jwt_keys()?.issue(user, email.as_deref())?);
        }
    }

    Ok(())
}
