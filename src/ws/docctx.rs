use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Mutable sync state of one document.
#[derive(Debug, Default)]
pub struct DocState {
    /// Live snapshot. `None` until the document is loaded or first edited.
    pub latest: Option<String>,
    /// Content as of the last successful durable write.
    pub last_saved: Option<String>,
    /// Debounce timer of the next save. At most one per document.
    pub pending_save: Option<JoinHandle<()>>,
}

impl DocState {
    pub fn has_pending_save(&self) -> bool {
        self.pending_save.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

#[derive(Debug)]
pub struct DocContext {
    pub doc_id: String,
    pub state: Mutex<DocState>,
    /// Serializes saves and restores of this document. Held across store
    /// calls, unlike `state`, so live updates never wait on persistence.
    pub save_gate: Mutex<()>,
}

impl DocContext {
    pub fn new(doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            state: Mutex::new(DocState::default()),
            save_gate: Mutex::new(()),
        }
    }
}

/// Per-document sync state, evicted after a period without access.
///
/// Eviction only drops the cache's reference. A pending save keeps its own
/// handle on the context and still completes.
pub struct DocCache {
    cache: Cache<String, Arc<DocContext>>,
}

impl DocCache {
    pub fn new(time_to_idle: Duration) -> Self {
        let cache = Cache::<String, Arc<DocContext>>::builder()
            .time_to_idle(time_to_idle)
            .eviction_listener(|doc_id: Arc<String>, _ctx: Arc<DocContext>, cause: RemovalCause| {
                debug!("Evicted sync state of document {} ({:?})", doc_id, cause);
            })
            .build();
        Self { cache }
    }

    pub fn get_or_create(&self, doc_id: &str) -> Arc<DocContext> {
        self.cache
            .get_with(doc_id.to_string(), || Arc::new(DocContext::new(doc_id)))
    }

    #[cfg(test)]
    pub fn get(&self, doc_id: &str) -> Option<Arc<DocContext>> {
        self.cache.get(doc_id)
    }

    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Number of documents with a debounce timer still waiting to fire.
    pub fn pending_saves(&self) -> usize {
        self.cache
            .iter()
            .filter(|(_, ctx)| {
                ctx.state
                    .try_lock()
                    .map(|state| state.has_pending_save())
                    .unwrap_or(true)
            })
            .count()
    }
}
