//! Persisted conversations and messages as the relay sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::call::CallSystemPayload;

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    /// Mimetype, e.g. `image/png`.
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A durably stored message. The relay never writes user-authored messages itself,
/// it only forwards what the REST layer already persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    /// Present only on system messages such as call logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<CallSystemPayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn system(sender_id: Uuid, receiver_id: Uuid, payload: CallSystemPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            message: String::new(),
            attachments: Vec::new(),
            edited: false,
            edited_at: None,
            reply_to: None,
            system: Some(payload),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_system(&self) -> bool {
        self.system.is_some()
    }
}

/// Conversation between exactly two participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    /// Message ids in append order.
    pub messages: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}
