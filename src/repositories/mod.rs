//! Collaborator stores consumed by the relay: block lists and conversations.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CallSystemPayload, ChatMessage, Conversation};

pub mod memory_repo;
pub mod pg_repo;

pub use memory_repo::MemoryRepository;
pub use pg_repo::PgRepository;

/// User directory keyed by identity.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Users that `user_id` has blocked.
    async fn blocked_contacts(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}

/// Durable conversation history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Conversation between the pair, created empty if missing.
    async fn find_or_create(&self, a: Uuid, b: Uuid) -> AppResult<Conversation>;

    /// Persist a system message from `sender_id` to `receiver_id`.
    async fn create_system_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        payload: CallSystemPayload,
    ) -> AppResult<ChatMessage>;

    /// Append a stored message to the end of the conversation's message list.
    async fn append_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()>;
}

/// True if either party has blocked the other.
pub async fn is_blocked_between(users: &dyn UserStore, a: Uuid, b: Uuid) -> AppResult<bool> {
    let a_blocks = users.blocked_contacts(a).await?;
    if a_blocks.contains(&b) {
        return Ok(true);
    }
    let b_blocks = users.blocked_contacts(b).await?;
    Ok(b_blocks.contains(&a))
}
