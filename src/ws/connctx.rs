use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;
use crate::models::{Color, SendMessage};
use crate::utils::locks;

pub type ConnId = Uuid;

/// Outgoing messages for one connection, drained by its socket writer.
pub type Outbox = mpsc::Sender<Arc<SendMessage>>;
pub type OutboxReceiver = mpsc::Receiver<Arc<SendMessage>>;

/// Author recorded on saves from a connection that never set a name.
pub const ANONYMOUS_EDITOR: &str = "Anonymous";
/// Author recorded on restores from a connection that never set a name.
pub const RESTORED_EDITOR: &str = "Restored";

/// Identity of a live connection.
#[derive(Clone, Debug)]
pub struct ConnCtx {
    pub name: Option<String>,
    /// Shown in chat, typing and cursor events until a name is set.
    pub fallback_name: String,
    pub color: Color,
    outbox: Outbox,
}

impl ConnCtx {
    pub fn who(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.fallback_name)
    }

    pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }
}

/// `"User"` followed by a random four digit number.
pub fn generate_name() -> String {
    format!("User{}", rand::rng().random_range(1000..10000))
}

/// Registry of connection identities and outboxes, keyed by connection id.
///
/// Outboxes are bounded. A connection whose outbox is full is dropped from
/// the registry, which closes its outbox and ends its socket.
pub struct ConnRegistry {
    conns: RwLock<HashMap<ConnId, ConnCtx>>,
    outbox_capacity: usize,
}

impl ConnRegistry {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            conns: RwLock::new(HashMap::new()),
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    /// Register a new connection with a random color.
    pub fn register(&self) -> (ConnId, OutboxReceiver) {
        let (outbox, rx) = mpsc::channel(self.outbox_capacity);
        let conn_id = Uuid::new_v4();
        let ctx = ConnCtx {
            name: None,
            fallback_name: generate_name(),
            color: Color::random(),
            outbox,
        };
        locks::write(&self.conns).insert(conn_id, ctx);
        (conn_id, rx)
    }

    pub fn remove(&self, conn_id: ConnId) -> Option<ConnCtx> {
        locks::write(&self.conns).remove(&conn_id)
    }

    /// Store the trimmed name, or a generated one when it is blank or absent.
    /// Returns the name now in effect.
    pub fn set_name(&self, conn_id: ConnId, name: Option<&str>) -> Option<String> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => generate_name(),
        };
        let mut conns = locks::write(&self.conns);
        let ctx = conns.get_mut(&conn_id)?;
        ctx.name = Some(name.clone());
        Some(name)
    }

    pub fn get(&self, conn_id: ConnId) -> Option<ConnCtx> {
        locks::read(&self.conns).get(&conn_id).cloned()
    }

    /// Queue a message for one connection. Returns false if it is gone, or
    /// if its outbox was full and it has been dropped.
    pub fn send(&self, conn_id: ConnId, msg: &Arc<SendMessage>) -> bool {
        {
            let conns = locks::read(&self.conns);
            let Some(ctx) = conns.get(&conn_id) else {
                return false;
            };
            match ctx.outbox.try_send(Arc::clone(msg)) {
                Ok(()) => return true,
                Err(TrySendError::Closed(_)) => return false,
                Err(TrySendError::Full(_)) => {}
            }
        }
        warn!(
            "Outbox of connection {} is full ({} messages), dropping the connection",
            conn_id, self.outbox_capacity
        );
        self.remove(conn_id);
        false
    }

    pub fn len(&self) -> usize {
        locks::read(&self.conns).len()
    }
}
