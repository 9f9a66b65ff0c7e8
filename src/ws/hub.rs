//! Real-time sync hub.
//!
//! Owns room membership, connection identities and per-document sync state,
//! and fans messages out to connection outboxes. Content is replaced as a
//! full snapshot on every update: the last update applied wins.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use crate::db::DocStore;
use crate::models::{
    ChatHistoryMessage, DocContentMessage, HistoryMessage, PresenceMessage, SendMessage,
};
use super::connctx::{ConnId, ConnRegistry, OutboxReceiver};
use super::docctx::DocCache;
use super::rooms::{Presence, Rooms};

/// Tunables of the sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub save_debounce: Duration,
    pub max_history: usize,
    pub chat_history_cap: usize,
    pub doc_idle_ttl: Duration,
    pub outbox_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(1200),
            max_history: 6000,
            chat_history_cap: 200,
            doc_idle_ttl: Duration::from_secs(30 * 60),
            outbox_capacity: 256,
        }
    }
}

/// Snapshot of hub activity for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
    pub room_members: usize,
    pub cached_docs: u64,
    pub pending_saves: usize,
}

pub struct Hub {
    pub(super) store: Arc<dyn DocStore>,
    pub(super) settings: SyncSettings,
    pub(super) conns: ConnRegistry,
    pub(super) rooms: Rooms,
    pub(super) docs: DocCache,
}

impl Hub {
    pub fn new(store: Arc<dyn DocStore>, settings: SyncSettings) -> Arc<Self> {
        info!(
            "Sync hub using {} store (debounce {:?}, max history {}, chat cap {})",
            store.name(),
            settings.save_debounce,
            settings.max_history,
            settings.chat_history_cap
        );
        Arc::new(Self {
            store,
            docs: DocCache::new(settings.doc_idle_ttl),
            conns: ConnRegistry::new(settings.outbox_capacity),
            settings,
            rooms: Rooms::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    /// Register a connection. Its messages arrive on the returned receiver.
    pub fn connect(&self) -> (ConnId, OutboxReceiver) {
        let (conn_id, rx) = self.conns.register();
        debug!("Connection {} registered", conn_id);
        (conn_id, rx)
    }

    /// Drop a connection: leave its room (updating presence there) and forget its identity.
    pub fn disconnect(&self, conn_id: ConnId) {
        // Unregister first: a join racing this call sees the connection gone
        // after adding it to a room, and undoes the membership itself.
        self.conns.remove(conn_id);
        if let Some(doc_id) = self.leave_room(conn_id) {
            info!("Connection {} left document {}", conn_id, doc_id);
        }
        debug!("Connection {} removed", conn_id);
    }

    fn leave_room(&self, conn_id: ConnId) -> Option<String> {
        self.rooms.leave(conn_id, |presence| self.send_presence(presence))
    }

    pub fn set_name(&self, conn_id: ConnId, name: Option<&str>) {
        if let Some(name) = self.conns.set_name(conn_id, name) {
            debug!("Connection {} is now known as {}", conn_id, name);
        }
    }

    /// Join `doc_id` and deliver its snapshot, history and chat log to the joiner.
    pub async fn join(&self, conn_id: ConnId, doc_id: &str) {
        if doc_id.is_empty() {
            warn!("Connection {} sent join-doc without a document id", conn_id);
            return;
        }
        if self.conns.get(conn_id).is_none() {
            return;
        }

        self.rooms.join(conn_id, doc_id, |presence| self.send_presence(presence));
        if self.conns.get(conn_id).is_none() {
            self.leave_room(conn_id);
            debug!("Connection {} went away while joining {}", conn_id, doc_id);
            return;
        }
        info!("Connection {} joined document {}", conn_id, doc_id);

        let stored = match self.store.find_document(doc_id).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to load document '{}': {}", doc_id, e);
                return;
            }
        };

        let ctx = self.docs.get_or_create(doc_id);
        {
            let mut state = ctx.state.lock().await;
            let content = match &state.latest {
                Some(latest) => latest.clone(),
                None => {
                    let content = stored
                        .as_ref()
                        .map(|doc| doc.content.clone())
                        .unwrap_or_default();
                    state.latest = Some(content.clone());
                    state.last_saved.get_or_insert_with(|| content.clone());
                    content
                }
            };
            // Queued under the state lock: no update-text can overtake it.
            self.send_to(conn_id, SendMessage::InitDoc(DocContentMessage {
                doc_id: doc_id.to_string(),
                content,
            }));
        }
        let history = stored.map(|doc| doc.history).unwrap_or_default();
        self.send_to(conn_id, SendMessage::HistoryData(HistoryMessage { history }));

        match self.store.chat_history(doc_id).await {
            Ok(messages) => {
                self.send_to(conn_id, SendMessage::ChatHistory(ChatHistoryMessage { messages }));
            }
            Err(e) => error!("Failed to load chat history of '{}': {}", doc_id, e),
        }
    }

    /// Replace the live snapshot of `doc_id` and pass it to every other room member.
    pub async fn apply_update(self: &Arc<Self>, conn_id: ConnId, doc_id: &str, content: String) {
        if !self.is_joined(conn_id, doc_id) {
            debug!("Dropping text-change from {} for unjoined document '{}'", conn_id, doc_id);
            return;
        }
        let Some(conn) = self.conns.get(conn_id) else {
            return;
        };
        let edited_by = conn.name_or(super::connctx::ANONYMOUS_EDITOR).to_string();

        let ctx = self.docs.get_or_create(doc_id);
        let mut state = ctx.state.lock().await;
        state.latest = Some(content.clone());
        // Broadcast under the state lock so receipt order is kept.
        self.broadcast(
            doc_id,
            SendMessage::UpdateText(DocContentMessage {
                doc_id: doc_id.to_string(),
                content,
            }),
            Some(conn_id),
        );
        self.schedule_save(&ctx, &mut state, edited_by);
    }

    pub fn stats(&self) -> HubStats {
        let (rooms, room_members) = self.rooms.counts();
        HubStats {
            connections: self.conns.len(),
            rooms,
            room_members,
            cached_docs: self.docs.len(),
            pending_saves: self.docs.pending_saves(),
        }
    }

    pub(super) fn is_joined(&self, conn_id: ConnId, doc_id: &str) -> bool {
        !doc_id.is_empty() && self.rooms.is_member(conn_id, doc_id)
    }

    pub(super) fn send_to(&self, conn_id: ConnId, msg: SendMessage) {
        if !self.conns.send(conn_id, &Arc::new(msg)) {
            debug!("Connection {} is gone, message dropped", conn_id);
        }
    }

    /// Send `msg` to every member of `doc_id`, optionally skipping one connection.
    pub(super) fn broadcast(&self, doc_id: &str, msg: SendMessage, except: Option<ConnId>) {
        let msg = Arc::new(msg);
        for member in self.rooms.members(doc_id) {
            if Some(member) != except {
                self.conns.send(member, &msg);
            }
        }
    }

    fn send_presence(&self, presence: &Presence) {
        let msg = Arc::new(SendMessage::PresenceUpdate(PresenceMessage { count: presence.count }));
        for member in &presence.audience {
            self.conns.send(*member, &msg);
        }
        debug!("Presence of {} is now {}", presence.doc_id, presence.count);
    }

    /// Re-read the history of `doc_id` and send it to the whole room.
    pub(super) async fn broadcast_history(&self, doc_id: &str) {
        match self.store.find_document(doc_id).await {
            Ok(doc) => {
                let history = doc.map(|doc| doc.history).unwrap_or_default();
                self.broadcast(doc_id, SendMessage::HistoryData(HistoryMessage { history }), None);
            }
            Err(e) => error!("Failed to reload history of '{}': {}", doc_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memstore::MemoryDocStore;
    use crate::db::DocStore;
    use crate::models::Version;
    use super::super::test_support::{drain, joined};
    use chrono::Utc;

    fn memory_hub() -> (Arc<Hub>, Arc<MemoryDocStore>) {
        let store = Arc::new(MemoryDocStore::new());
        (Hub::new(store.clone(), SyncSettings::default()), store)
    }

    fn presence_counts(msgs: &[Arc<SendMessage>]) -> Vec<usize> {
        msgs.iter()
            .filter_map(|m| match &**m {
                SendMessage::PresenceUpdate(p) => Some(p.count),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn join_delivers_presence_snapshot_history_and_chat() {
        let (hub, store) = memory_hub();
        store.ensure_exists("d1", "").await.unwrap();
        store
            .append_version("d1", &Version::new("<p>saved</p>", "Alice", Utc::now()), 6000)
            .await
            .unwrap();

        let (_conn, mut rx) = joined(&hub, "d1", Some("Bob")).await;
        let msgs = drain(&mut rx);

        assert_eq!(msgs.len(), 4);
        assert_eq!(*msgs[0], SendMessage::PresenceUpdate(PresenceMessage { count: 1 }));
        assert_eq!(
            *msgs[1],
            SendMessage::InitDoc(DocContentMessage {
                doc_id: "d1".into(),
                content: "<p>saved</p>".into(),
            })
        );
        match &*msgs[2] {
            SendMessage::HistoryData(h) => assert_eq!(h.history.len(), 1),
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(*msgs[3], SendMessage::ChatHistory(ChatHistoryMessage { messages: vec![] }));
    }

    #[tokio::test]
    async fn join_of_unknown_document_starts_empty() {
        let (hub, _store) = memory_hub();
        let (_conn, mut rx) = joined(&hub, "fresh", None).await;
        let msgs = drain(&mut rx);
        assert_eq!(
            *msgs[1],
            SendMessage::InitDoc(DocContentMessage {
                doc_id: "fresh".into(),
                content: String::new(),
            })
        );
        assert_eq!(*msgs[2], SendMessage::HistoryData(HistoryMessage { history: vec![] }));
    }

    #[tokio::test]
    async fn join_prefers_live_content_over_stored() {
        let (hub, store) = memory_hub();
        store.ensure_exists("d1", "stored").await.unwrap();
        let (alice, _alice_rx) = joined(&hub, "d1", Some("Alice")).await;
        hub.apply_update(alice, "d1", "unsaved edit".to_string()).await;

        let (_bob, mut bob_rx) = joined(&hub, "d1", Some("Bob")).await;
        let init = drain(&mut bob_rx)
            .into_iter()
            .find_map(|m| match &*m {
                SendMessage::InitDoc(d) => Some(d.content.clone()),
                _ => None,
            });
        assert_eq!(init.as_deref(), Some("unsaved edit"));
    }

    #[tokio::test]
    async fn empty_document_id_is_ignored() {
        let (hub, _store) = memory_hub();
        let (conn, mut rx) = hub.connect();
        hub.join(conn, "").await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(hub.stats().rooms, 0);
    }

    #[tokio::test]
    async fn presence_counts_follow_membership() {
        let (hub, _store) = memory_hub();
        let (a, mut a_rx) = joined(&hub, "d1", Some("A")).await;
        assert_eq!(presence_counts(&drain(&mut a_rx)), vec![1]);

        let (b, mut b_rx) = joined(&hub, "d1", Some("B")).await;
        assert_eq!(presence_counts(&drain(&mut a_rx)), vec![2]);
        assert_eq!(presence_counts(&drain(&mut b_rx)), vec![2]);

        let (_c, mut c_rx) = joined(&hub, "d1", Some("C")).await;
        drain(&mut c_rx);
        drain(&mut a_rx);

        hub.disconnect(b);
        assert_eq!(presence_counts(&drain(&mut a_rx)), vec![2]);
        assert_eq!(presence_counts(&drain(&mut c_rx)), vec![2]);

        hub.disconnect(a);
        assert_eq!(presence_counts(&drain(&mut c_rx)), vec![1]);
        assert_eq!(hub.stats().connections, 1);
    }

    #[tokio::test]
    async fn switching_documents_updates_both_rooms() {
        let (hub, _store) = memory_hub();
        let (a, mut a_rx) = joined(&hub, "d1", Some("A")).await;
        let (_b, mut b_rx) = joined(&hub, "d1", Some("B")).await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        hub.join(a, "d2").await;
        assert_eq!(presence_counts(&drain(&mut b_rx)), vec![1]);
        assert_eq!(presence_counts(&drain(&mut a_rx)), vec![1]);

        let stats = hub.stats();
        assert_eq!((stats.rooms, stats.room_members), (2, 2));
    }

    #[tokio::test]
    async fn updates_reach_others_but_never_echo() {
        let (hub, _store) = memory_hub();
        let (a, mut a_rx) = joined(&hub, "d1", Some("A")).await;
        let (_b, mut b_rx) = joined(&hub, "d1", Some("B")).await;
        let (_c, mut c_rx) = joined(&hub, "d1", Some("C")).await;
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        hub.apply_update(a, "d1", "one".to_string()).await;
        hub.apply_update(a, "d1", "two".to_string()).await;

        assert!(drain(&mut a_rx).is_empty());
        for rx in [&mut b_rx, &mut c_rx] {
            let contents: Vec<_> = drain(rx)
                .into_iter()
                .map(|m| match &*m {
                    SendMessage::UpdateText(d) => d.content.clone(),
                    other => panic!("unexpected message {:?}", other),
                })
                .collect();
            assert_eq!(contents, vec!["one", "two"]);
        }

        let ctx = hub.docs.get("d1").unwrap();
        assert_eq!(ctx.state.lock().await.latest.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn updates_from_outside_the_room_are_dropped() {
        let (hub, _store) = memory_hub();
        let (_a, mut a_rx) = joined(&hub, "d1", Some("A")).await;
        drain(&mut a_rx);
        let (outsider, _rx) = hub.connect();

        hub.apply_update(outsider, "d1", "spam".to_string()).await;
        assert!(drain(&mut a_rx).is_empty());
        assert!(hub.docs.get("d1").unwrap().state.lock().await.latest.as_deref() != Some("spam"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_keep_the_last_applied() {
        let store = Arc::new(MemoryDocStore::new());
        let hub = Hub::new(store, SyncSettings::default());
        let mut conns = Vec::new();
        for i in 0..8 {
            conns.push(joined(&hub, "d1", Some(&format!("U{i}"))).await);
        }

        let tasks: Vec<_> = conns
            .iter()
            .map(|(conn, _)| {
                let hub = Arc::clone(&hub);
                let conn = *conn;
                tokio::spawn(async move {
                    for n in 0..20 {
                        hub.apply_update(conn, "d1", format!("{conn}-{n}")).await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Every other member saw the same final snapshot last.
        let latest = hub.docs.get("d1").unwrap().state.lock().await.latest.clone().unwrap();
        for (conn, rx) in conns.iter_mut() {
            let last_seen = drain(rx)
                .into_iter()
                .filter_map(|m| match &*m {
                    SendMessage::UpdateText(d) => Some(d.content.clone()),
                    _ => None,
                })
                .last();
            if !latest.starts_with(&conn.to_string()) {
                assert_eq!(last_seen.as_deref(), Some(latest.as_str()));
            }
        }
    }

    /// Content a connection ends up showing: the last init-doc or update-text.
    fn final_view(msgs: &[Arc<SendMessage>]) -> Option<String> {
        assert!(msgs.iter().any(|m| matches!(&**m, SendMessage::InitDoc(_))), "no init-doc");
        msgs.iter()
            .filter_map(|m| match &**m {
                SendMessage::InitDoc(d) | SendMessage::UpdateText(d) => Some(d.content.clone()),
                _ => None,
            })
            .last()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joiner_racing_updates_converges_on_latest() {
        for _ in 0..50 {
            let (hub, _store) = memory_hub();
            let (writer, _writer_rx) = joined(&hub, "d1", Some("Writer")).await;

            let updates = {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    for n in 0..40 {
                        hub.apply_update(writer, "d1", format!("v{n}")).await;
                        tokio::task::yield_now().await;
                    }
                })
            };
            let joiner = {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move { joined(&hub, "d1", Some("Joiner")).await })
            };
            updates.await.unwrap();
            let (_joiner, mut joiner_rx) = joiner.await.unwrap();

            let latest = hub.docs.get("d1").unwrap().state.lock().await.latest.clone();
            assert_eq!(final_view(&drain(&mut joiner_rx)), latest);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn join_racing_disconnect_leaves_no_member() {
        let (hub, _store) = memory_hub();
        let (_watcher, _watcher_rx) = joined(&hub, "d1", Some("Watcher")).await;

        for _ in 0..200 {
            let (conn, _rx) = hub.connect();
            let joining = {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move { hub.join(conn, "d1").await })
            };
            let leaving = {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move { hub.disconnect(conn) })
            };
            joining.await.unwrap();
            leaving.await.unwrap();
        }

        let stats = hub.stats();
        assert_eq!((stats.connections, stats.room_members), (1, 1));
    }

    #[tokio::test]
    async fn join_after_disconnect_is_ignored() {
        let (hub, _store) = memory_hub();
        let (conn, mut rx) = hub.connect();
        hub.disconnect(conn);
        hub.join(conn, "d1").await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(hub.stats().room_members, 0);
    }
}
