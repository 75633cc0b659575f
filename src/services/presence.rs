//! Presence registry: who is reachable right now, and every open socket for broadcasts.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ConnectionId, ServerEvent};

/// Outbound side of one live WebSocket session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a pre-serialized frame. Returns false once the session's writer is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(text).is_ok()
    }

    pub fn send(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to encode event");
                false
            }
        }
    }
}

/// userId -> latest connection, plus all open connections (including anonymous and
/// superseded ones) so that snapshot broadcasts reach every socket.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    open: HashMap<ConnectionId, ConnectionHandle>,
    by_user: HashMap<Uuid, ConnectionHandle>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a socket that has no user identity. It only receives broadcasts.
    pub fn attach(&mut self, handle: ConnectionHandle) {
        self.open.insert(handle.id().clone(), handle);
    }

    /// Close a socket that was never registered to a user.
    pub fn detach(&mut self, conn_id: &ConnectionId) {
        self.open.remove(conn_id);
    }

    /// Map `user_id` to `handle`, replacing any previous mapping, then broadcast the online set.
    /// The replaced connection stays open (orphaned) and is returned.
    pub fn register(&mut self, user_id: Uuid, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.open.insert(handle.id().clone(), handle.clone());
        let previous = self.by_user.insert(user_id, handle);
        if let Some(prev) = &previous {
            debug!(user_id = %user_id, orphaned = %prev.id(), "connection superseded");
        }
        info!(user_id = %user_id, online = self.by_user.len(), "user online");
        self.broadcast_online();
        previous
    }

    /// Close `conn_id` for `user_id`. The user goes offline only if `conn_id` is their
    /// current connection; returns whether that happened. Broadcasts the online set.
    pub fn unregister(&mut self, user_id: Uuid, conn_id: &ConnectionId) -> bool {
        self.open.remove(conn_id);
        let current = self
            .by_user
            .get(&user_id)
            .map(|h| h.id() == conn_id)
            .unwrap_or(false);
        if current {
            self.by_user.remove(&user_id);
            info!(user_id = %user_id, online = self.by_user.len(), "user offline");
        } else {
            debug!(user_id = %user_id, conn_id = %conn_id, "orphaned connection closed");
        }
        self.broadcast_online();
        current
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<&ConnectionHandle> {
        self.by_user.get(&user_id)
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn connection(&self, conn_id: &ConnectionId) -> Option<&ConnectionHandle> {
        self.open.get(conn_id)
    }

    /// Online user ids, sorted for stable output.
    pub fn online_users(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.by_user.keys().copied().collect();
        users.sort();
        users
    }

    pub fn open_connections(&self) -> usize {
        self.open.len()
    }

    /// Deliver to the user's current connection. False if the user is unreachable.
    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) -> bool {
        match self.lookup(user_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    pub fn send_to_connection(&self, conn_id: &ConnectionId, event: &ServerEvent) -> bool {
        match self.connection(conn_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    /// Send to every open connection; returns how many accepted the frame.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to encode broadcast");
                return 0;
            }
        };
        self.open
            .values()
            .filter(|h| h.send_text(text.clone()))
            .count()
    }

    pub fn broadcast_online(&self) -> usize {
        self.broadcast(&ServerEvent::OnlineUsers {
            data: self.online_users(),
        })
    }
}
