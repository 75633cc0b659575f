//! Busy-state tracker: admission control for calls.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::presence::PresenceRegistry;
use crate::models::ServerEvent;

/// Users currently ringing out or in an active call.
///
/// Mutators report whether the set changed. Callers batch their mutations and then
/// call [`BusyStateTracker::broadcast`] once, so every mutating event still ends with
/// exactly one `users:busy` snapshot.
#[derive(Debug, Default)]
pub struct BusyStateTracker {
    users: HashSet<Uuid>,
}

impl BusyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_busy(&mut self, user_id: Uuid) -> bool {
        let added = self.users.insert(user_id);
        if added {
            debug!(user_id = %user_id, "busy");
        }
        added
    }

    pub fn clear_busy(&mut self, user_id: Uuid) -> bool {
        let removed = self.users.remove(&user_id);
        if removed {
            debug!(user_id = %user_id, "no longer busy");
        }
        removed
    }

    pub fn is_busy(&self, user_id: Uuid) -> bool {
        self.users.contains(&user_id)
    }

    pub fn snapshot(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.users.iter().copied().collect();
        users.sort();
        users
    }

    /// Push the current snapshot to every open connection.
    pub fn broadcast(&self, presence: &PresenceRegistry) -> usize {
        presence.broadcast(&ServerEvent::BusyUsers {
            data: self.snapshot(),
        })
    }
}
