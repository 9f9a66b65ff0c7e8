use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};
use crate::models::Version;
use super::docctx::{DocContext, DocState};
use super::hub::Hub;

/// Result of one save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Nothing changed since the last durable write.
    Unchanged,
    Failed,
}

impl Hub {
    /// Re-arm the debounce timer of a document.
    ///
    /// Called with the document's state lock held, so replacing the timer is
    /// atomic and only one timer is ever outstanding. The timer covers the
    /// debounce wait only: once it fires, the save runs as its own task and a
    /// later edit cannot cancel it.
    pub(super) fn schedule_save(
        self: &Arc<Self>,
        ctx: &Arc<DocContext>,
        state: &mut DocState,
        edited_by: String,
    ) {
        if let Some(timer) = state.pending_save.take() {
            timer.abort();
        }

        let hub = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        let delay = self.settings.save_debounce;
        state.pending_save = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                hub.save(&ctx, &edited_by).await;
            });
        }));
    }

    /// Write the live snapshot of a document as a new version, unless it is
    /// what was last written.
    ///
    /// Store failures are logged and not retried. The next edit schedules a
    /// fresh save with whatever is live then.
    pub(super) async fn save(&self, ctx: &DocContext, edited_by: &str) -> SaveOutcome {
        let doc_id = ctx.doc_id.as_str();
        let _gate = ctx.save_gate.lock().await;

        let content = {
            let state = ctx.state.lock().await;
            match &state.latest {
                Some(latest) if state.last_saved.as_ref() != Some(latest) => latest.clone(),
                _ => {
                    debug!("Document {} unchanged since last save, skipping", doc_id);
                    return SaveOutcome::Unchanged;
                }
            }
        };

        if let Err(e) = self.store.ensure_exists(doc_id, &content).await {
            error!("Failed to create document '{}': {}", doc_id, e);
            return SaveOutcome::Failed;
        }

        let version = Version::new(content.clone(), edited_by, Utc::now());
        let max_history = self.settings.max_history;
        if let Err(e) = self.store.append_version(doc_id, &version, max_history).await {
            error!("Failed to save document '{}': {}", doc_id, e);
            return SaveOutcome::Failed;
        }

        ctx.state.lock().await.last_saved = Some(content);
        info!("Saved document {} (edited by {})", doc_id, edited_by);

        self.broadcast_history(doc_id).await;
        SaveOutcome::Saved
    }
}
