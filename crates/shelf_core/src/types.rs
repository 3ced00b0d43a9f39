use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Processing state shared by metadata extraction and embedding generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown processing status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub image_url: Option<String>,
    pub word_count: i64,
    pub metadata_status: ProcessingStatus,
    pub retry_count: i32,
    pub confidence_score: f64,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub embedding_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// A freshly saved link, waiting for metadata extraction.
    pub fn new(user_id: Uuid, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            url: url.into(),
            title: String::new(),
            description: String::new(),
            content: String::new(),
            image_url: None,
            word_count: 0,
            metadata_status: ProcessingStatus::Pending,
            retry_count: 0,
            confidence_score: 0.0,
            embedding: None,
            embedding_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Whether the stored embedding may be used as a similarity candidate.
    pub fn is_recommendable(&self) -> bool {
        self.metadata_status == ProcessingStatus::Success
            && self.embedding_status == ProcessingStatus::Success
            && self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Text used to represent the article in embedding space.
    pub fn profile_text(&self) -> String {
        format!("{} {}", self.title, self.description).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub const MIN_SCORE: i32 = 1;
    pub const MAX_SCORE: i32 = 5;

    pub fn new(user_id: Uuid, article_id: Uuid, score: i32) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            article_id,
            score,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_valid_score(score: i32) -> bool {
        (Self::MIN_SCORE..=Self::MAX_SCORE).contains(&score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

/// A transient recommendation result; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedArticle {
    pub article: Article,
    pub score: f64,
    pub reason: String,
    pub recommender_used: String,
}

/// Aggregate rating figures for a single article.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingStats {
    pub average: f64,
    pub count: usize,
}

/// Result of asking the provider whether a piece of text reads like an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub is_article: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: String,
    pub embedding_model: String,
    pub embedding_model_loaded: bool,
}
