use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use shelf_core::popularity::MIN_RATINGS;
use shelf_core::{
    Article, ArticleStorage, Error, ProcessingStatus, Rating, RatingStats, RatingStorage, Result, SimilarityStorage,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::rank_by_similarity;
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        image_url TEXT,
        word_count INTEGER NOT NULL DEFAULT 0,
        metadata_status TEXT NOT NULL DEFAULT 'pending',
        retry_count INTEGER NOT NULL DEFAULT 0,
        confidence_score REAL NOT NULL DEFAULT 0,
        embedding TEXT,
        embedding_status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_user ON articles (user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (metadata_status, embedding_status)",
    r#"
    CREATE TABLE IF NOT EXISTS ratings (
        user_id TEXT NOT NULL,
        article_id TEXT NOT NULL,
        score INTEGER NOT NULL CHECK (score >= 1 AND score <= 5),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, article_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ratings_article ON ratings (article_id)",
    // Add future migrations here
];

const DEFAULT_DB_PATH: &str = "shelf.db";

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn new() -> Result<Self> where Self: Sized {
        Self::new_with_path(&PathBuf::from(DEFAULT_DB_PATH)).await
    }
}

fn db_err(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

fn timestamp(t: &DateTime<Utc>) -> String {
    // Fixed width keeps lexical order equal to time order
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date '{}': {}", value, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Database(format!("Invalid id '{}': {}", value, e)))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let get_str = |column: &str| -> Result<String> { row.try_get::<String, _>(column).map_err(db_err("Failed to read article")) };

    let embedding = row
        .try_get::<Option<String>, _>("embedding")
        .map_err(db_err("Failed to read article"))?
        .map(|raw| serde_json::from_str::<Vec<f32>>(&raw))
        .transpose()?;

    Ok(Article {
        id: parse_uuid(&get_str("id")?)?,
        user_id: parse_uuid(&get_str("user_id")?)?,
        url: get_str("url")?,
        title: get_str("title")?,
        description: get_str("description")?,
        content: get_str("content")?,
        image_url: row.try_get("image_url").map_err(db_err("Failed to read article"))?,
        word_count: row.try_get("word_count").map_err(db_err("Failed to read article"))?,
        metadata_status: get_str("metadata_status")?.parse()?,
        retry_count: row.try_get("retry_count").map_err(db_err("Failed to read article"))?,
        confidence_score: row.try_get("confidence_score").map_err(db_err("Failed to read article"))?,
        embedding,
        embedding_status: get_str("embedding_status")?.parse()?,
        created_at: parse_timestamp(&get_str("created_at")?)?,
        updated_at: parse_timestamp(&get_str("updated_at")?)?,
    })
}

fn row_to_rating(row: &SqliteRow) -> Result<Rating> {
    let get_str = |column: &str| -> Result<String> { row.try_get::<String, _>(column).map_err(db_err("Failed to read rating")) };

    Ok(Rating {
        user_id: parse_uuid(&get_str("user_id")?)?,
        article_id: parse_uuid(&get_str("article_id")?)?,
        score: row.try_get("score").map_err(db_err("Failed to read rating"))?,
        created_at: parse_timestamp(&get_str("created_at")?)?,
        updated_at: parse_timestamp(&get_str("updated_at")?)?,
    })
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        Self::open(options).await
    }

    /// Connect using a `sqlite://path` style URL
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err("Invalid database URL"))?
            .create_if_missing(true);
        Self::open(options).await
    }

    async fn open(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        info!("SQLite storage ready ({} migrations)", MIGRATIONS.len());

        Ok(Self { pool: Arc::new(pool) })
    }

    async fn fetch_articles<'a>(&self, query: sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>>) -> Result<Vec<Article>> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to load articles"))?;
        rows.iter().map(row_to_article).collect()
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn create_article(&self, article: &Article) -> Result<()> {
        let embedding = article.embedding.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (id, user_id, url, title, description, content, image_url, word_count, metadata_status,
             retry_count, confidence_score, embedding, embedding_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(article.user_id.to_string())
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(article.image_url.as_deref())
        .bind(article.word_count)
        .bind(article.metadata_status.as_str())
        .bind(article.retry_count)
        .bind(article.confidence_score)
        .bind(embedding)
        .bind(article.embedding_status.as_str())
        .bind(timestamp(&article.created_at))
        .bind(timestamp(&article.updated_at))
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to store article"))?;

        Ok(())
    }

    async fn get_article(&self, id: Uuid) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to load article"))?
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))?;
        row_to_article(&row)
    }

    async fn update_article(&self, article: &Article) -> Result<()> {
        let embedding = article.embedding.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE articles SET
                url = ?, title = ?, description = ?, content = ?, image_url = ?, word_count = ?,
                metadata_status = ?, retry_count = ?, confidence_score = ?, embedding = ?,
                embedding_status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(article.image_url.as_deref())
        .bind(article.word_count)
        .bind(article.metadata_status.as_str())
        .bind(article.retry_count)
        .bind(article.confidence_score)
        .bind(embedding)
        .bind(article.embedding_status.as_str())
        .bind(timestamp(&article.updated_at))
        .bind(article.id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to update article"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", article.id)));
        }
        Ok(())
    }

    async fn delete_article(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM ratings WHERE article_id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete article ratings"))?;

        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete article"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", id)));
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Article>> {
        self.fetch_articles(
            sqlx::query("SELECT * FROM articles WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(user_id.to_string())
                .bind(limit as i64)
                .bind(offset as i64),
        )
        .await
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM articles WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("count"))
            .map_err(db_err("Failed to count articles"))?;
        Ok(count as usize)
    }

    async fn find_failed_metadata(&self, max_retries: i32) -> Result<Vec<Article>> {
        self.fetch_articles(
            sqlx::query(
                "SELECT * FROM articles WHERE metadata_status = ? AND retry_count < ? ORDER BY updated_at ASC",
            )
            .bind(ProcessingStatus::Failed.as_str())
            .bind(max_retries),
        )
        .await
    }

    async fn find_popular(&self, limit: usize) -> Result<Vec<Article>> {
        self.fetch_articles(
            sqlx::query(
                r#"
                SELECT a.* FROM articles a
                LEFT JOIN (
                    SELECT article_id, COUNT(*) AS rating_count, AVG(score) AS avg_rating
                    FROM ratings
                    GROUP BY article_id
                    HAVING COUNT(*) >= ?
                ) r ON a.id = r.article_id
                WHERE a.metadata_status = ?
                ORDER BY
                    COALESCE(r.rating_count, 0) DESC,
                    COALESCE(r.avg_rating, 0) DESC,
                    a.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(MIN_RATINGS as i64)
            .bind(ProcessingStatus::Success.as_str())
            .bind(limit as i64),
        )
        .await
    }
}

#[async_trait]
impl RatingStorage for SQLiteStorage {
    async fn upsert_rating(&self, rating: &Rating) -> Result<Rating> {
        sqlx::query(
            r#"
            INSERT INTO ratings (user_id, article_id, score, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, article_id)
            DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at
            "#,
        )
        .bind(rating.user_id.to_string())
        .bind(rating.article_id.to_string())
        .bind(rating.score)
        .bind(timestamp(&rating.created_at))
        .bind(timestamp(&rating.updated_at))
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to store rating"))?;

        self.get_rating(rating.user_id, rating.article_id)
            .await?
            .ok_or_else(|| Error::Storage("rating vanished after upsert".to_string()))
    }

    async fn get_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<Option<Rating>> {
        let row = sqlx::query("SELECT * FROM ratings WHERE user_id = ? AND article_id = ?")
            .bind(user_id.to_string())
            .bind(article_id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to load rating"))?;
        row.as_ref().map(row_to_rating).transpose()
    }

    async fn delete_rating(&self, user_id: Uuid, article_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM ratings WHERE user_id = ? AND article_id = ?")
            .bind(user_id.to_string())
            .bind(article_id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete rating"))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("rating".to_string()));
        }
        Ok(())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Rating>> {
        let rows = sqlx::query("SELECT * FROM ratings WHERE user_id = ? ORDER BY created_at ASC, article_id ASC")
            .bind(user_id.to_string())
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to load ratings"))?;
        rows.iter().map(row_to_rating).collect()
    }

    async fn average_and_count(&self, article_id: Uuid) -> Result<RatingStats> {
        let row = sqlx::query("SELECT COUNT(*) AS count, AVG(score) AS average FROM ratings WHERE article_id = ?")
            .bind(article_id.to_string())
            .fetch_one(&*self.pool)
            .await
            .map_err(db_err("Failed to aggregate ratings"))?;

        let count: i64 = row.try_get("count").map_err(db_err("Failed to aggregate ratings"))?;
        let average: Option<f64> = row.try_get("average").map_err(db_err("Failed to aggregate ratings"))?;
        Ok(RatingStats {
            average: average.unwrap_or(0.0),
            count: count as usize,
        })
    }
}

#[async_trait]
impl SimilarityStorage for SQLiteStorage {
    async fn index_article(&self, article: &Article) -> Result<()> {
        let embedding = article.embedding.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query("UPDATE articles SET embedding = ?, embedding_status = ? WHERE id = ?")
            .bind(embedding)
            .bind(article.embedding_status.as_str())
            .bind(article.id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to store embedding"))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", article.id)));
        }
        Ok(())
    }

    async fn remove_article(&self, article_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE articles SET embedding = NULL, embedding_status = ? WHERE id = ?")
            .bind(ProcessingStatus::Pending.as_str())
            .bind(article_id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to remove embedding"))?;
        Ok(())
    }

    async fn find_similar(&self, query: &[f32], exclude_owner: Uuid, limit: usize) -> Result<Vec<Article>> {
        let candidates = self
            .fetch_articles(
                sqlx::query(
                    r#"
                    SELECT * FROM articles
                    WHERE user_id != ?
                      AND embedding IS NOT NULL
                      AND metadata_status = ?
                      AND embedding_status = ?
                    "#,
                )
                .bind(exclude_owner.to_string())
                .bind(ProcessingStatus::Success.as_str())
                .bind(ProcessingStatus::Success.as_str()),
            )
            .await?;
        Ok(rank_by_similarity(query, candidates, limit))
    }
}
