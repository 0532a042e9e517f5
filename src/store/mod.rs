use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One completed job. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub generated_content: String,
    pub created_at: DateTime<Utc>,
}

/// Durable record of completed jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a record and return its id. The same link may be saved any number of times.
    async fn save(&self, title: &str, link: &str, content: &str) -> Result<i64, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Newest first
    async fn recent(&self, limit: i64) -> Result<Vec<JobRecord>, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS translation_posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    generated_content TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (creating if needed) the database at `url` and make sure the table exists
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private database living as long as the store; used by tests and dry runs
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn save(&self, title: &str, link: &str, content: &str) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO translation_posts (title, link, generated_content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(link)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM translation_posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<JobRecord>, StoreError> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT id, title, link, generated_content, created_at FROM translation_posts ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
