//! PostgreSQL-backed user and conversation stores.

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ConversationStore, UserStore};
use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::models::{CallSystemPayload, ChatMessage, Conversation};

#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgRepository {
    #[instrument(skip(self))]
    async fn blocked_contacts(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        db::user_blocked_contacts(&self.pool, user_id).await
    }
}

#[async_trait]
impl ConversationStore for PgRepository {
    #[instrument(skip(self))]
    async fn find_or_create(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        db::conversation_ensure(&self.pool, a, b).await
    }

    #[instrument(skip(self, payload))]
    async fn create_system_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        payload: CallSystemPayload,
    ) -> AppResult<ChatMessage> {
        let message = db::message_create_system(&self.pool, sender_id, receiver_id, &payload).await?;
        debug!(message_id = %message.id, "system message stored");
        Ok(message)
    }

    #[instrument(skip(self))]
    async fn append_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()> {
        db::conversation_append_message(&self.pool, conversation_id, message_id).await
    }
}
