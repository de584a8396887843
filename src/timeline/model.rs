use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sort-key cursor into the canonical messages view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCursor {
    pub timestamp: DateTime<Utc>,
    pub message_id: Uuid,
}

/// Sort-key cursor into the conversations-by-user view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCursor {
    pub last_message_at: DateTime<Utc>,
    pub conversation_id: i64,
}

/// Sort-key cursor into the messages-by-user view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessageCursor {
    pub conversation_id: i64,
    pub timestamp: DateTime<Utc>,
    pub message_id: Uuid,
}
