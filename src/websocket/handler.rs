use std::sync::Arc;
use axum::{
    extract::{State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::models::ReceivedMessage;
use crate::utils::scope_guard::ScopeGuard;
use crate::ws::{ConnId, Hub};

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<Hub>>,
) -> Response {
    info!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {

    // Register the connection; it gets an identity and an outbox
    let (connection_id, mut outbox) = hub.connect();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // Leave the room and drop the identity however this function exits
    let guard_hub = hub.clone();
    let _disconnect = ScopeGuard::new(move || guard_hub.disconnect(connection_id));

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Forward everything queued for this connection to the client
    let mut writer_task = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            let text = match serde_json::to_string(&*msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", connection_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Process incoming messages in the order they arrive
    let reader_hub = hub.clone();
    let mut reader_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            };

            // Parse the incoming message as JSON
            let msg: ReceivedMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Dropping malformed message from {}: {}", connection_id, e);
                    continue;
                }
            };
            handle_message(&reader_hub, connection_id, msg).await;
        }
    });

    // Wait for either task to finish, then stop the other and wait for it to
    // unwind so no message handling overlaps the guard's disconnect
    let writer_done = tokio::select! {
        _ = (&mut writer_task) => true,
        _ = (&mut reader_task) => false,
    };
    let remaining = if writer_done { reader_task } else { writer_task };
    remaining.abort();
    if let Err(e) = remaining.await {
        if !e.is_cancelled() {
            error!("WebSocket task of {} failed: {}", connection_id, e);
        }
    }
    info!("WebSocket connection {} terminated", connection_id);
}

/// Route one client message to the hub.
pub async fn handle_message(hub: &Arc<Hub>, connection_id: ConnId, msg: ReceivedMessage) {
    match msg {
        ReceivedMessage::SetName(m) => hub.set_name(connection_id, m.name.as_deref()),
        ReceivedMessage::JoinDoc(m) => hub.join(connection_id, &m.doc_id).await,
        ReceivedMessage::TextChange(m) => {
            hub.apply_update(connection_id, &m.doc_id, m.content).await
        }
        ReceivedMessage::ViewVersion(m) => {
            hub.view_version(connection_id, &m.doc_id, m.index).await
        }
        ReceivedMessage::RestoreVersion(m) => {
            hub.restore_version(connection_id, &m.doc_id, m.index).await
        }
        ReceivedMessage::ChatMessage(m) => hub.send_chat(connection_id, &m.doc_id, &m.msg).await,
        ReceivedMessage::Typing(m) => hub.typing(connection_id, &m.doc_id),
        ReceivedMessage::CursorUpdate(m) => hub.cursor_update(connection_id, &m.doc_id, m.position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memstore::MemoryDocStore;
    use crate::routes::create_app;
    use crate::ws::SyncSettings;
    use futures_util::stream::{SplitSink, SplitStream};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct TestClient {
        tx: SplitSink<Client, tungstenite::Message>,
        rx: SplitStream<Client>,
    }

    impl TestClient {
        async fn connect(addr: &str) -> Self {
            let (stream, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
            let (tx, rx) = stream.split();
            Self { tx, rx }
        }

        async fn send(&mut self, value: Value) {
            self.tx.send(tungstenite::Message::text(value.to_string())).await.unwrap();
        }

        async fn send_raw(&mut self, text: &str) {
            self.tx.send(tungstenite::Message::text(text)).await.unwrap();
        }

        /// Next event of type `kind`, skipping others.
        async fn expect(&mut self, kind: &str) -> Value {
            timeout(Duration::from_secs(2), async {
                loop {
                    let frame = self.rx.next().await.expect("socket closed").unwrap();
                    if let tungstenite::Message::Text(text) = frame {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                        if value["type"] == kind {
                            return value;
                        }
                    }
                }
            })
            .await
            .unwrap_or_else(|_| panic!("no {kind} event"))
        }

        /// Assert no event of type `kind` arrives within a short window.
        async fn expect_none(&mut self, kind: &str) {
            let found = timeout(Duration::from_millis(300), async {
                loop {
                    match self.rx.next().await {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            let value: Value = serde_json::from_str(text.as_str()).unwrap();
                            if value["type"] == kind {
                                return value;
                            }
                        }
                        Some(_) => continue,
                        None => std::future::pending::<()>().await,
                    }
                }
            })
            .await;
            assert!(found.is_err(), "unexpected {kind} event: {:?}", found);
        }

        async fn join(&mut self, name: &str, doc_id: &str) {
            self.send(json!({"type": "set-name", "name": name})).await;
            self.send(json!({"type": "join-doc", "docId": doc_id})).await;
            self.expect("chat-history").await;
        }
    }

    async fn start_server() -> String {
        let hub = Hub::new(Arc::new(MemoryDocStore::new()), SyncSettings::default());
        let app = create_app(hub, &Config::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn text_change_reaches_others_without_echo() {
        let addr = start_server().await;
        let mut alice = TestClient::connect(&addr).await;
        let mut bob = TestClient::connect(&addr).await;
        alice.join("Alice", "d1").await;
        bob.join("Bob", "d1").await;
        assert_eq!(alice.expect("presence-update").await["count"], 2);

        alice.send(json!({"type": "text-change", "docId": "d1", "content": "<p>Hello</p>"})).await;

        let update = bob.expect("update-text").await;
        assert_eq!(
            update,
            json!({"type": "update-text", "docId": "d1", "content": "<p>Hello</p>"})
        );
        alice.expect_none("update-text").await;
    }

    #[tokio::test]
    async fn chat_and_cursor_round_trip() {
        let addr = start_server().await;
        let mut alice = TestClient::connect(&addr).await;
        let mut bob = TestClient::connect(&addr).await;
        alice.join("Alice", "d1").await;
        bob.join("Bob", "d1").await;

        bob.send(json!({"type": "chat-message", "docId": "d1", "msg": "hello"})).await;
        for client in [&mut alice, &mut bob] {
            let line = client.expect("chat-message").await;
            assert_eq!(line["who"], "Bob");
            assert_eq!(line["msg"], "hello");
            assert!(line["at"].is_string());
        }

        bob.send(json!({"type": "cursor-update", "docId": "d1", "position": 12})).await;
        let cursor = alice.expect("cursor-update").await;
        assert_eq!(cursor["who"], "Bob");
        assert_eq!(cursor["position"], 12);
        assert!(cursor["color"].as_str().unwrap().starts_with("hsl("));
        assert!(cursor["connectionId"].is_string());
    }

    #[tokio::test]
    async fn disconnect_updates_presence_of_the_room() {
        let addr = start_server().await;
        let mut alice = TestClient::connect(&addr).await;
        let mut bob = TestClient::connect(&addr).await;
        alice.join("Alice", "d1").await;
        bob.join("Bob", "d1").await;
        assert_eq!(alice.expect("presence-update").await["count"], 2);

        drop(bob);
        assert_eq!(alice.expect("presence-update").await["count"], 1);
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let addr = start_server().await;
        let mut alice = TestClient::connect(&addr).await;
        alice.send_raw("not json").await;
        alice.send(json!({"type": "no-such-event"})).await;
        alice.send(json!({"type": "join-doc", "docId": ""})).await;

        // The connection is still usable afterwards.
        alice.join("Alice", "d1").await;
        alice.send(json!({"type": "view-version", "docId": "d1", "index": 0})).await;
        alice.expect_none("version-view").await;
    }
}
