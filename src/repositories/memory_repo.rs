//! In-process user and conversation stores, used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConversationStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::{CallSystemPayload, ChatMessage, Conversation, PairKey};

#[derive(Default)]
struct Inner {
    blocks: HashMap<Uuid, HashSet<Uuid>>,
    conversations: HashMap<PairKey, Conversation>,
    messages: HashMap<Uuid, ChatMessage>,
}

/// Everything lives behind one lock; cheap to clone and share.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Inner>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` blocked `blocked_id`.
    pub async fn block(&self, user_id: Uuid, blocked_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.blocks.entry(user_id).or_default().insert(blocked_id);
    }

    pub async fn unblock(&self, user_id: Uuid, blocked_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(set) = inner.blocks.get_mut(&user_id) {
            set.remove(&blocked_id);
        }
    }

    /// Make every subsequent write fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Messages of the pair's conversation in append order.
    pub async fn messages_between(&self, a: Uuid, b: Uuid) -> Vec<ChatMessage> {
        let inner = self.inner.read().await;
        inner
            .conversations
            .get(&PairKey::new(a, b))
            .map(|c| {
                c.messages
                    .iter()
                    .filter_map(|id| inner.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryRepository {
    async fn blocked_contacts(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .blocks
            .get(&user_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ConversationStore for MemoryRepository {
    async fn find_or_create(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        self.check_writable()?;
        let key = PairKey::new(a, b);
        let mut inner = self.inner.write().await;
        let convo = inner.conversations.entry(key).or_insert_with(|| Conversation {
            id: Uuid::new_v4(),
            participants: [key.low(), key.high()],
            messages: Vec::new(),
            created_at: Utc::now(),
        });
        Ok(convo.clone())
    }

    async fn create_system_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        payload: CallSystemPayload,
    ) -> AppResult<ChatMessage> {
        self.check_writable()?;
        let message = ChatMessage::system(sender_id, receiver_id, payload);
        let mut inner = self.inner.write().await;
        inner.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn append_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let convo = inner
            .conversations
            .values_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| AppError::Validation(format!("unknown conversation {}", conversation_id)))?;
        if !convo.messages.contains(&message_id) {
            convo.messages.push(message_id);
        }
        Ok(())
    }
}
