use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use crate::utils::locks;
use super::connctx::ConnId;

/// Presence of one room at the moment of a membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub doc_id: String,
    pub count: usize,
    /// Connections that should hear about the change.
    pub audience: Vec<ConnId>,
}

#[derive(Default)]
struct Membership {
    rooms: HashMap<String, HashSet<ConnId>>,
    joined: HashMap<ConnId, String>,
}

impl Membership {
    fn audience(&self, doc_id: &str) -> Vec<ConnId> {
        self.rooms
            .get(doc_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop `conn_id` from its room and report the presence left behind.
    fn remove(&mut self, conn_id: ConnId) -> Option<Presence> {
        let doc_id = self.joined.remove(&conn_id)?;
        let members = self.rooms.get_mut(&doc_id)?;
        // The leaver is still counted here.
        let count = members.len().saturating_sub(1);
        members.remove(&conn_id);
        if members.is_empty() {
            self.rooms.remove(&doc_id);
        }
        let audience = self.audience(&doc_id);
        Some(Presence { doc_id, count, audience })
    }
}

/// Which connections belong to which document room.
///
/// A connection is in at most one room. Joining another document leaves the
/// previous one first. Presence callbacks run while the membership lock is
/// held, so counts reach each room in the order the changes happened.
#[derive(Default)]
pub struct Rooms {
    inner: Mutex<Membership>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn_id` to `doc_id`. `notify` is called for the room that was left
    /// (if any) and then for the joined room, whose count includes the joiner.
    pub fn join(&self, conn_id: ConnId, doc_id: &str, mut notify: impl FnMut(&Presence)) {
        let mut membership = locks::lock(&self.inner);

        if membership.joined.get(&conn_id).is_some_and(|current| current != doc_id) {
            if let Some(left) = membership.remove(conn_id) {
                notify(&left);
            }
        }

        membership.joined.insert(conn_id, doc_id.to_string());
        let members = membership.rooms.entry(doc_id.to_string()).or_default();
        members.insert(conn_id);
        let count = members.len();
        let presence = Presence {
            doc_id: doc_id.to_string(),
            count,
            audience: membership.audience(doc_id),
        };
        notify(&presence);
    }

    /// Remove `conn_id` from its room. `notify` receives the remaining members
    /// and the count without the leaver.
    pub fn leave(&self, conn_id: ConnId, mut notify: impl FnMut(&Presence)) -> Option<String> {
        let mut membership = locks::lock(&self.inner);
        let presence = membership.remove(conn_id)?;
        notify(&presence);
        Some(presence.doc_id)
    }

    pub fn members(&self, doc_id: &str) -> Vec<ConnId> {
        locks::lock(&self.inner).audience(doc_id)
    }

    pub fn is_member(&self, conn_id: ConnId, doc_id: &str) -> bool {
        locks::lock(&self.inner)
            .joined
            .get(&conn_id)
            .is_some_and(|current| current == doc_id)
    }

    /// Number of non-empty rooms and total joined connections.
    pub fn counts(&self) -> (usize, usize) {
        let membership = locks::lock(&self.inner);
        (membership.rooms.len(), membership.joined.len())
    }
}
