use std::sync::Arc;
use crate::models::SendMessage;
use super::connctx::{ConnId, OutboxReceiver};
use super::hub::Hub;

/// Connect, optionally name, and join `doc_id`.
pub async fn joined(hub: &Arc<Hub>, doc_id: &str, name: Option<&str>) -> (ConnId, OutboxReceiver) {
    let (conn, rx) = hub.connect();
    if name.is_some() {
        hub.set_name(conn, name);
    }
    hub.join(conn, doc_id).await;
    (conn, rx)
}

/// Everything queued for a connection so far.
pub fn drain(rx: &mut OutboxReceiver) -> Vec<Arc<SendMessage>> {
    let mut msgs = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        msgs.push(msg);
    }
    msgs
}
