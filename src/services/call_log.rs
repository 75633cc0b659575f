//! Durable call-log entries, deduplicated per participant pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::relay::RelayHandle;
use super::signaling::FinishedCall;
use crate::error::AppResult;
use crate::models::{CallSystemPayload, ChatMessage, PairKey};
use crate::repositories::ConversationStore;

/// Both peers usually send `call:end` for the same call; only the first one inside
/// `window` is logged. Entries older than the window are pruned on every new entry.
pub struct CallLogDeduplicator {
    window: Duration,
    recent: HashMap<PairKey, Instant>,
    store: Arc<dyn ConversationStore>,
}

impl CallLogDeduplicator {
    pub fn new(window: Duration, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            window,
            recent: HashMap::new(),
            store,
        }
    }

    /// Record an end for the pair at `now`. False if one was already logged within the window.
    pub fn admit(&mut self, call: &FinishedCall, now: Instant) -> bool {
        let key = PairKey::new(call.ended_by, call.peer);
        if let Some(last) = self.recent.get(&key) {
            if now.saturating_duration_since(*last) <= self.window {
                return false;
            }
        }
        let window = self.window;
        self.recent
            .retain(|_, logged| now.saturating_duration_since(*logged) <= window);
        self.recent.insert(key, now);
        true
    }

    pub fn tracked_pairs(&self) -> usize {
        self.recent.len()
    }

    /// Persist and fan out a call-log message without blocking the caller. Failures are
    /// dropped: a missing log entry never affects signaling.
    pub fn log_call_end(&mut self, call: FinishedCall, relay: Option<RelayHandle>) -> Option<JoinHandle<()>> {
        if !self.admit(&call, Instant::now()) {
            debug!(from = %call.ended_by, to = %call.peer, "duplicate call end, not logged");
            return None;
        }
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            match persist_call_log(store.as_ref(), &call).await {
                Ok(message) => {
                    info!(message_id = %message.id, from = %call.ended_by, to = %call.peer, "call logged");
                    if let Some(relay) = relay {
                        let _ = relay.deliver_call_log(message);
                    }
                }
                Err(e) => debug!(from = %call.ended_by, to = %call.peer, error = %e, "call log dropped"),
            }
        }))
    }
}

/// Find or create the pair's conversation, store the system message, and append it.
pub async fn persist_call_log(
    store: &dyn ConversationStore,
    call: &FinishedCall,
) -> AppResult<ChatMessage> {
    let conversation = store.find_or_create(call.ended_by, call.peer).await?;
    let message = store
        .create_system_message(
            call.ended_by,
            call.peer,
            CallSystemPayload::ended_call(call.call_type, call.accepted),
        )
        .await?;
    store.append_message(conversation.id, message.id).await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CallType;
    use crate::repositories::MemoryRepository;
    use uuid::Uuid;

    fn finished(a: Uuid, b: Uuid) -> FinishedCall {
        FinishedCall {
            ended_by: a,
            peer: b,
            call_type: CallType::Video,
            accepted: true,
        }
    }

    fn dedup() -> CallLogDeduplicator {
        CallLogDeduplicator::new(Duration::from_secs(15), Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn second_end_within_window_is_suppressed_either_direction() {
        let mut dedup = dedup();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let t0 = Instant::now();
        assert!(dedup.admit(&finished(a, b), t0));
        assert!(!dedup.admit(&finished(b, a), t0 + Duration::from_secs(2)));
        assert!(!dedup.admit(&finished(a, b), t0 + Duration::from_secs(15)));
        assert!(dedup.admit(&finished(a, b), t0 + Duration::from_secs(16)));
    }

    #[test]
    fn different_pairs_are_independent() {
        let mut dedup = dedup();
        let a = Uuid::new_v4();
        let t0 = Instant::now();
        assert!(dedup.admit(&finished(a, Uuid::new_v4()), t0));
        assert!(dedup.admit(&finished(a, Uuid::new_v4()), t0));
        assert_eq!(dedup.tracked_pairs(), 2);
    }

    #[test]
    fn stale_entries_are_pruned() {
        let mut dedup = dedup();
        let t0 = Instant::now();
        for _ in 0..10 {
            dedup.admit(&finished(Uuid::new_v4(), Uuid::new_v4()), t0);
        }
        assert_eq!(dedup.tracked_pairs(), 10);
        dedup.admit(&finished(Uuid::new_v4(), Uuid::new_v4()), t0 + Duration::from_secs(30));
        assert_eq!(dedup.tracked_pairs(), 1);
    }

    #[tokio::test]
    async fn persists_into_shared_conversation() {
        let repo = MemoryRepository::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let message = persist_call_log(&repo, &finished(a, b)).await.unwrap();
        let system = message.system.clone().unwrap();
        assert_eq!(system.call_type, CallType::Video);
        assert_eq!(system.duration_sec, 0);
        assert!(system.accepted);
        assert_eq!(repo.messages_between(b, a).await, vec![message]);
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let repo = MemoryRepository::new();
        repo.set_fail_writes(true);
        let mut dedup = CallLogDeduplicator::new(Duration::from_secs(15), Arc::new(repo.clone()));
        let task = dedup
            .log_call_end(finished(Uuid::new_v4(), Uuid::new_v4()), None)
            .unwrap();
        assert!(task.await.is_ok());
    }
}
