//! Durable storage for documents, their version history and chat logs.
//!
//! The sync engine only talks to [`DocStore`]. Two backends exist:
//! [`pgstore::PgDocStore`] for PostgreSQL and [`memstore::MemoryDocStore`]
//! for running without a database.

pub mod memstore;
pub mod pgstore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::models::{ChatLine, Version};

/// A document record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub doc_id: String,
    pub content: String,
    pub history: Vec<Version>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("document '{0}' not found")]
    DocumentNotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DocStore: Send + Sync {
    /// Short backend name for logs and readiness output.
    fn name(&self) -> &'static str;

    /// Check that the backend can serve requests.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_document(&self, doc_id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Create the record with `initial_content` and an empty history if it is absent.
    /// An existing record is never touched.
    async fn ensure_exists(&self, doc_id: &str, initial_content: &str) -> Result<(), StoreError>;

    /// Set the current content to `version.content` and append `version` to the
    /// history in one atomic step, keeping at most `max_history` entries.
    async fn append_version(
        &self,
        doc_id: &str,
        version: &Version,
        max_history: usize,
    ) -> Result<(), StoreError>;

    /// Append a chat line, keeping at most `cap` lines. Creates the log if needed.
    async fn push_chat(&self, doc_id: &str, line: &ChatLine, cap: usize) -> Result<(), StoreError>;

    async fn chat_history(&self, doc_id: &str) -> Result<Vec<ChatLine>, StoreError>;
}
