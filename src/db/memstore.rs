use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use crate::db::{DocStore, StoreError, StoredDocument};
use crate::models::{push_capped, ChatLine, Version};

/// Process-local store. Used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryDocStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
    chats: RwLock<HashMap<String, Vec<ChatLine>>>,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_document(&self, doc_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.read().await.get(doc_id).cloned())
    }

    async fn ensure_exists(&self, doc_id: &str, initial_content: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        documents.entry(doc_id.to_string()).or_insert_with(|| {
            let now = chrono::Utc::now();
            StoredDocument {
                doc_id: doc_id.to_string(),
                content: initial_content.to_string(),
                history: Vec::new(),
                created_at: now,
                updated_at: now,
            }
        });
        Ok(())
    }

    async fn append_version(
        &self,
        doc_id: &str,
        version: &Version,
        max_history: usize,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(doc_id)
            .ok_or_else(|| StoreError::DocumentNotFound(doc_id.to_string()))?;
        doc.content = version.content.clone();
        doc.updated_at = version.version_at;
        push_capped(&mut doc.history, version.clone(), max_history);
        Ok(())
    }

    async fn push_chat(&self, doc_id: &str, line: &ChatLine, cap: usize) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        let log = chats.entry(doc_id.to_string()).or_default();
        push_capped(log, line.clone(), cap);
        Ok(())
    }

    async fn chat_history(&self, doc_id: &str) -> Result<Vec<ChatLine>, StoreError> {
        Ok(self.chats.read().await.get(doc_id).cloned().unwrap_or_default())
    }
}
