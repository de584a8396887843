use chrono::{DateTime, Utc};
use scylla::DeserializeRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest prefix of a message body that gets denormalized into the
/// conversation views as `last_message_preview`.
pub const PREVIEW_MAX_CHARS: usize = 160;

/// Canonical message row. `(conversation_id, timestamp, message_id)` is the
/// clustering identity; everything except `read_at` is immutable once
/// written.
#[derive(DeserializeRow, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub conversation_id: i64,
    pub timestamp: DateTime<Utc>,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        conversation_id: i64,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> Message {
        Message {
            conversation_id,
            timestamp,
            message_id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content,
            read_at: None,
        }
    }

    pub fn preview(&self) -> String {
        self.content.chars().take(PREVIEW_MAX_CHARS).collect()
    }
}

/// Copy of a message under one participant's partition, scannable per user
/// ordered by conversation, then time.
#[derive(DeserializeRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub user_id: Uuid,
    pub conversation_id: i64,
    pub timestamp: DateTime<Utc>,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

impl UserMessage {
    pub fn project(user_id: Uuid, message: &Message) -> UserMessage {
        UserMessage {
            user_id,
            conversation_id: message.conversation_id,
            timestamp: message.timestamp,
            message_id: message.message_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
        }
    }
}
