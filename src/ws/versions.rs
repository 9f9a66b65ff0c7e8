use chrono::Utc;
use tracing::{debug, error, info};
use crate::models::{SendMessage, Version, VersionRestoredMessage, VersionViewMessage};
use super::connctx::{ConnId, RESTORED_EDITOR};
use super::hub::Hub;

impl Hub {
    /// Send version `index` of `doc_id` to the requester only.
    ///
    /// Indexes are positions in the history as read now. An index past the end
    /// yields a `version-view` without a version; an unknown document yields nothing.
    pub async fn view_version(&self, conn_id: ConnId, doc_id: &str, index: usize) {
        if !self.is_joined(conn_id, doc_id) {
            debug!("Dropping view-version from {} for unjoined document '{}'", conn_id, doc_id);
            return;
        }

        let doc = match self.store.find_document(doc_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!("view-version for unknown document '{}'", doc_id);
                return;
            }
            Err(e) => {
                error!("Failed to load document '{}': {}", doc_id, e);
                return;
            }
        };

        self.send_to(conn_id, SendMessage::VersionView(VersionViewMessage {
            doc_id: doc_id.to_string(),
            index,
            version: doc.history.get(index).cloned(),
        }));
    }

    /// Make version `index` the live content again.
    ///
    /// History is never rewound: the restored content is appended as a new
    /// version by the requester. The room gets the restored content and the
    /// refreshed history.
    pub async fn restore_version(&self, conn_id: ConnId, doc_id: &str, index: usize) {
        if !self.is_joined(conn_id, doc_id) {
            debug!("Dropping restore-version from {} for unjoined document '{}'", conn_id, doc_id);
            return;
        }
        let Some(conn) = self.conns.get(conn_id) else {
            return;
        };
        let restored_by = conn.name_or(RESTORED_EDITOR).to_string();

        let ctx = self.docs.get_or_create(doc_id);
        let _gate = ctx.save_gate.lock().await;

        let doc = match self.store.find_document(doc_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!("restore-version for unknown document '{}'", doc_id);
                return;
            }
            Err(e) => {
                error!("Failed to load document '{}': {}", doc_id, e);
                return;
            }
        };
        let Some(target) = doc.history.get(index) else {
            debug!(
                "restore-version index {} out of range for '{}' ({} versions)",
                index,
                doc_id,
                doc.history.len()
            );
            return;
        };
        let content = target.content.clone();

        let version = Version::new(content.clone(), restored_by.as_str(), Utc::now());
        let max_history = self.settings.max_history;
        if let Err(e) = self.store.append_version(doc_id, &version, max_history).await {
            error!("Failed to restore version {} of '{}': {}", index, doc_id, e);
            return;
        }

        {
            let mut state = ctx.state.lock().await;
            state.latest = Some(content.clone());
            // A pending debounce now finds nothing new to write.
            state.last_saved = Some(content.clone());
            let restored = SendMessage::VersionRestored(VersionRestoredMessage { content });
            self.broadcast(doc_id, restored, None);
        }
        info!("Document {} restored to version {} by {}", doc_id, index, restored_by);

        self.broadcast_history(doc_id).await;
    }
}
