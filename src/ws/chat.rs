use chrono::Utc;
use tracing::{debug, error};
use crate::models::{ChatLine, CursorMessage, SendMessage, TypingMessage};
use super::connctx::ConnId;
use super::hub::Hub;

impl Hub {
    /// Persist a chat line and send it to the whole room, sender included.
    pub async fn send_chat(&self, conn_id: ConnId, doc_id: &str, msg: &str) {
        if doc_id.is_empty() || msg.trim().is_empty() {
            debug!("Dropping empty chat message from {}", conn_id);
            return;
        }
        if !self.is_joined(conn_id, doc_id) {
            debug!("Dropping chat message from {} for unjoined document '{}'", conn_id, doc_id);
            return;
        }
        let Some(conn) = self.conns.get(conn_id) else {
            return;
        };

        let line = ChatLine::new(conn.who(), msg, Utc::now());
        if let Err(e) = self.store.push_chat(doc_id, &line, self.settings.chat_history_cap).await {
            error!("Failed to store chat message for '{}': {}", doc_id, e);
            return;
        }
        self.broadcast(doc_id, SendMessage::ChatMessage(line), None);
    }

    /// Tell the other members that this connection is typing. Not persisted.
    pub fn typing(&self, conn_id: ConnId, doc_id: &str) {
        if !self.is_joined(conn_id, doc_id) {
            return;
        }
        let Some(conn) = self.conns.get(conn_id) else {
            return;
        };
        self.broadcast(
            doc_id,
            SendMessage::Typing(TypingMessage { who: conn.who().to_string() }),
            Some(conn_id),
        );
    }

    /// Share this connection's approximate cursor offset with the other members.
    /// Advisory only, with no ordering relative to content updates.
    pub fn cursor_update(&self, conn_id: ConnId, doc_id: &str, position: u64) {
        if !self.is_joined(conn_id, doc_id) {
            return;
        }
        let Some(conn) = self.conns.get(conn_id) else {
            return;
        };
        self.broadcast(
            doc_id,
            SendMessage::CursorUpdate(CursorMessage {
                connection_id: conn_id,
                who: conn.who().to_string(),
                position,
                color: conn.color,
            }),
            Some(conn_id),
        );
    }
}
