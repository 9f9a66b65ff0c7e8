use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{debug, error, info};
use crate::db::{DocStore, StoreError, StoredDocument};
use crate::models::{ChatLine, Version};

const CREATE_DOCUMENTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        doc_id TEXT PRIMARY KEY,
        content TEXT NOT NULL DEFAULT '',
        history JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_CHATS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS chats (
        doc_id TEXT PRIMARY KEY,
        messages JSONB NOT NULL DEFAULT '[]'::jsonb
    )
"#;

/// PostgreSQL backed document store
///
/// History and chat logs are kept as JSONB arrays on the document row, so a
/// capped append is a single statement and stays atomic across processes.
pub struct PgDocStore {
    pool: PgPool,
}

impl PgDocStore {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    /// * `max_connections` - Upper bound for the pool size
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(2) // Keep some connections alive
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // Close idle connections after 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // Recycle connections after 30 minutes
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the `documents` and `chats` tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(CREATE_DOCUMENTS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_CHATS_SQL).execute(&self.pool).await?;
        info!("Database schema ready");
        Ok(())
    }

    fn log_pool_stats(&self, action: &str, doc_id: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        debug!(
            "{} for doc {}. Pool connections: {} idle, {} in use",
            action,
            doc_id,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl DocStore for PgDocStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Unavailable("connection pool is closed".to_string()));
        }
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_document(&self, doc_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.log_pool_stats("Loading document", doc_id);

        let row = sqlx::query(
            "SELECT doc_id, content, history, created_at, updated_at FROM documents WHERE doc_id = $1",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history: Vec<Version> = serde_json::from_value(row.try_get("history")?).map_err(|e| {
            error!("Failed to decode history of document '{}': {}", doc_id, e);
            e
        })?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(StoredDocument {
            doc_id: row.try_get("doc_id")?,
            content: row.try_get("content")?,
            history,
            created_at,
            updated_at,
        }))
    }

    async fn ensure_exists(&self, doc_id: &str, initial_content: &str) -> Result<(), StoreError> {
        self.log_pool_stats("Ensuring document", doc_id);

        let query_sql = r#"
            INSERT INTO documents (doc_id, content, history, created_at, updated_at)
            VALUES ($1, $2, '[]'::jsonb, NOW(), NOW())
            ON CONFLICT (doc_id) DO NOTHING
        "#;
        sqlx::query(query_sql)
            .bind(doc_id)
            .bind(initial_content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_version(
        &self,
        doc_id: &str,
        version: &Version,
        max_history: usize,
    ) -> Result<(), StoreError> {
        self.log_pool_stats("Appending version", doc_id);

        // Keep the newest `max_history` entries of (history + new version), in order.
        let query_sql = r#"
            UPDATE documents
            SET content = $2,
                updated_at = $3,
                history = (
                    SELECT COALESCE(jsonb_agg(h.entry ORDER BY h.ord), '[]'::jsonb)
                    FROM (
                        SELECT entry, ord
                        FROM jsonb_array_elements(documents.history || jsonb_build_array($4::jsonb))
                            WITH ORDINALITY AS e(entry, ord)
                        ORDER BY ord DESC
                        LIMIT $5
                    ) h
                )
            WHERE doc_id = $1
            RETURNING doc_id
        "#;
        let row = sqlx::query(query_sql)
            .bind(doc_id)
            .bind(&version.content)
            .bind(version.version_at)
            .bind(Json(version))
            .bind(max_history as i64)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(_) => Ok(()),
            None => {
                error!("Document not found for version append: {}", doc_id);
                Err(StoreError::DocumentNotFound(doc_id.to_string()))
            }
        }
    }

    async fn push_chat(&self, doc_id: &str, line: &ChatLine, cap: usize) -> Result<(), StoreError> {
        self.log_pool_stats("Appending chat line", doc_id);

        let query_sql = r#"
            INSERT INTO chats (doc_id, messages)
            VALUES ($1, jsonb_build_array($2::jsonb))
            ON CONFLICT (doc_id) DO UPDATE
            SET messages = (
                SELECT COALESCE(jsonb_agg(m.entry ORDER BY m.ord), '[]'::jsonb)
                FROM (
                    SELECT entry, ord
                    FROM jsonb_array_elements(chats.messages || jsonb_build_array($2::jsonb))
                        WITH ORDINALITY AS e(entry, ord)
                    ORDER BY ord DESC
                    LIMIT $3
                ) m
            )
        "#;
        sqlx::query(query_sql)
            .bind(doc_id)
            .bind(Json(line))
            .bind(cap as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn chat_history(&self, doc_id: &str) -> Result<Vec<ChatLine>, StoreError> {
        let row = sqlx::query("SELECT messages FROM chats WHERE doc_id = $1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(serde_json::from_value(row.try_get("messages")?)?),
            None => Ok(Vec::new()),
        }
    }
}
