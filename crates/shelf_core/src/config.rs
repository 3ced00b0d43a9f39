use std::env;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8001";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://shelf.db";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub service_url: String,
    pub dimension: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub retry_interval: Duration,
    pub max_retries: i32,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub min_confidence: f64,
    pub http_timeout: Duration,
    pub user_agent: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens; the server refuses to start without one
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct QdrantSettings {
    pub host: Option<String>,
    pub collection: String,
}

/// Service configuration grouped by domain
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub worker: WorkerConfig,
    pub recommendation: RecommendationConfig,
    pub classifier: ClassifierConfig,
    pub qdrant: QdrantSettings,
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: DEFAULT_PORT },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
            },
            embedding: EmbeddingConfig {
                service_url: DEFAULT_EMBEDDING_URL.to_string(),
                dimension: DEFAULT_EMBEDDING_DIMENSION,
                timeout: Duration::from_secs(30),
            },
            worker: WorkerConfig {
                retry_interval: Duration::from_secs(5 * 60),
                max_retries: 3,
                concurrency: 4,
            },
            recommendation: RecommendationConfig {
                timeout: Some(Duration::from_secs(30)),
            },
            classifier: ClassifierConfig {
                min_confidence: 0.6,
                http_timeout: Duration::from_secs(30),
                user_agent: "Shelf-Bot/1.0".to_string(),
            },
            qdrant: QdrantSettings {
                host: None,
                collection: "articles".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: None,
                token_ttl: Duration::from_secs(24 * 3600),
            },
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset or empty keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("SERVER_PORT") {
            config.server.port = parse_number("SERVER_PORT", &port)?;
        }
        if let Some(url) = get("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(url) = get("EMBEDDING_SERVICE_URL") {
            config.embedding.service_url = url;
        }
        if let Some(dimension) = get("EMBEDDING_DIMENSION") {
            config.embedding.dimension = parse_number("EMBEDDING_DIMENSION", &dimension)?;
        }
        if let Some(timeout) = get("EMBEDDING_TIMEOUT") {
            config.embedding.timeout = parse_duration(&timeout)?;
        }
        if let Some(interval) = get("WORKER_RETRY_INTERVAL") {
            config.worker.retry_interval = parse_duration(&interval)?;
        }
        if let Some(concurrency) = get("WORKER_CONCURRENCY") {
            config.worker.concurrency = parse_number("WORKER_CONCURRENCY", &concurrency)?;
        }
        if let Some(timeout) = get("RECOMMENDATION_TIMEOUT") {
            let timeout = parse_duration(&timeout)?;
            config.recommendation.timeout = (!timeout.is_zero()).then_some(timeout);
        }
        if let Some(confidence) = get("CLASSIFIER_MIN_CONFIDENCE") {
            config.classifier.min_confidence = parse_number("CLASSIFIER_MIN_CONFIDENCE", &confidence)?;
        }
        if let Some(timeout) = get("CLASSIFIER_HTTP_TIMEOUT") {
            config.classifier.http_timeout = parse_duration(&timeout)?;
        }
        if let Some(agent) = get("CLASSIFIER_USER_AGENT") {
            config.classifier.user_agent = agent;
        }
        config.qdrant.host = get("QDRANT_HOST");
        if let Some(collection) = get("QDRANT_COLLECTION") {
            config.qdrant.collection = collection;
        }
        config.auth.jwt_secret = get("JWT_SECRET");
        if let Some(ttl) = get("JWT_EXPIRATION") {
            config.auth.token_ttl = parse_duration(&ttl)?;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid value for {}: '{}'", key, value)))
}

fn parse_component(digits: &str) -> Result<u64> {
    digits
        .parse::<u64>()
        .map_err(|_| Error::InvalidInput(format!("Invalid number in duration: {}", digits)))
}

fn out_of_range(s: &str) -> Error {
    Error::InvalidInput(format!("Duration out of range: {}", s))
}

/// Parse durations such as `30s`, `5m`, `1h15m30s` or `1d`; a bare number means seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let mut total_seconds = 0u64;
    let mut current_number = String::new();
    let mut has_unit = false;

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if !current_number.is_empty() {
            let num = parse_component(&current_number)?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(Error::InvalidInput(format!("Invalid duration unit: {}", c))),
            };
            total_seconds = num
                .checked_mul(unit)
                .and_then(|seconds| total_seconds.checked_add(seconds))
                .ok_or_else(|| out_of_range(s))?;
            current_number.clear();
            has_unit = true;
        } else if !c.is_whitespace() {
            return Err(Error::InvalidInput(format!("Invalid character in duration: {}", c)));
        }
    }

    if !current_number.is_empty() {
        let num = parse_component(&current_number)?;
        total_seconds = total_seconds.checked_add(num).ok_or_else(|| out_of_range(s))?;
        has_unit = true;
    }

    if !has_unit {
        return Err(Error::InvalidInput("Duration must include a number".to_string()));
    }

    Ok(Duration::from_secs(total_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h15m30s").unwrap(), Duration::from_secs(4530));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("").is_err());
        assert!(matches!(parse_duration("9999999999999999h"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_duration("99999999999999999999s"), Err(Error::InvalidInput(_))));
        assert!(matches!(
            parse_duration("18446744073709551615s1s"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.embedding.service_url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.worker.retry_interval, Duration::from_secs(300));
        assert_eq!(config.worker.max_retries, 3);
        assert!(config.qdrant.host.is_none());
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.auth.token_ttl, Duration::from_secs(86400));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "9000"),
            ("EMBEDDING_SERVICE_URL", "http://embed:8001"),
            ("WORKER_RETRY_INTERVAL", "1h"),
            ("RECOMMENDATION_TIMEOUT", "0"),
            ("CLASSIFIER_MIN_CONFIDENCE", "0.75"),
            ("QDRANT_HOST", "qdrant"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRATION", "2h"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.embedding.service_url, "http://embed:8001");
        assert_eq!(config.worker.retry_interval, Duration::from_secs(3600));
        assert!(config.recommendation.timeout.is_none());
        assert_eq!(config.classifier.min_confidence, 0.75);
        assert_eq!(config.qdrant.host.as_deref(), Some("qdrant"));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.token_ttl, Duration::from_secs(7200));
        assert!(!format!("{:?}", config.auth).contains("s3cret"));
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[("SERVER_PORT", "  ")])).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("SERVER_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WORKER_RETRY_INTERVAL", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WORKER_RETRY_INTERVAL", "9999999999999999h")])).is_err());
    }
}
