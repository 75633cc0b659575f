//! Repositories: user blocks, conversations (one per participant pair), system messages.

use crate::error::AppResult;
use crate::models::{Attachment, CallSystemPayload, ChatMessage, Conversation, PairKey};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;

// ---- User blocks ----

pub async fn user_blocked_contacts(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT blocked_id FROM user_blocks WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// ---- Conversations (1 pair = 1 conversation) ----

#[derive(Debug, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Find the conversation for the pair, creating it if none exists yet.
pub async fn conversation_ensure(pool: &DbPool, a: Uuid, b: Uuid) -> AppResult<Conversation> {
    let key = PairKey::new(a, b);
    sqlx::query(
        r#"
        INSERT INTO conversations (id, participant_low, participant_high)
        VALUES ($1, $2, $3)
        ON CONFLICT (participant_low, participant_high) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(key.low())
    .bind(key.high())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, ConversationRow>(
        r#"
        SELECT id, participant_low, participant_high, created_at
        FROM conversations
        WHERE participant_low = $1 AND participant_high = $2
        "#,
    )
    .bind(key.low())
    .bind(key.high())
    .fetch_one(pool)
    .await?;

    let messages: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT message_id FROM conversation_messages WHERE conversation_id = $1 ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    Ok(Conversation {
        id: row.id,
        participants: [row.participant_low, row.participant_high],
        messages: messages.into_iter().map(|(id,)| id).collect(),
        created_at: row.created_at,
    })
}

pub async fn conversation_append_message(
    pool: &DbPool,
    conversation_id: Uuid,
    message_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_messages (conversation_id, message_id)
        VALUES ($1, $2)
        ON CONFLICT (conversation_id, message_id) DO NOTHING
        "#,
    )
    .bind(conversation_id)
    .bind(message_id)
    .execute(pool)
    .await?;
    Ok(())
}

// ---- Messages ----

#[derive(Debug, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message: String,
    pub attachments: Json<Vec<Attachment>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub reply_to: Option<Uuid>,
    pub system: Option<Json<CallSystemPayload>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            message: row.message,
            attachments: row.attachments.0,
            edited: row.edited,
            edited_at: row.edited_at,
            reply_to: row.reply_to,
            system: row.system.map(|s| s.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn message_create_system(
    pool: &DbPool,
    sender_id: Uuid,
    receiver_id: Uuid,
    payload: &CallSystemPayload,
) -> AppResult<ChatMessage> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (id, sender_id, receiver_id, message, attachments, system)
        VALUES ($1, $2, $3, '', '[]'::jsonb, $4)
        RETURNING id, sender_id, receiver_id, message, attachments, edited, edited_at,
                  reply_to, system, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(Json(payload))
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}
