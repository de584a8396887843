use chrono::{DateTime, Utc};
use scylla::DeserializeRow;
use serde::Serialize;
use uuid::Uuid;

/// Source of truth for conversation metadata. Exactly one row exists per
/// unordered user pair; `user_a` sorts below `user_b`.
#[derive(DeserializeRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: i64,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
}

/// One participant's row in the conversations-by-user view, the unit of the
/// recent-activity listing.
#[derive(DeserializeRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub user_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub conversation_id: i64,
    pub other_user_id: Uuid,
    pub last_message_preview: String,
}

/// Canonical key for an unordered user pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub user_min: Uuid,
    pub user_max: Uuid,
}

impl PairKey {
    pub fn new(user_x: Uuid, user_y: Uuid) -> PairKey {
        if user_x <= user_y {
            PairKey { user_min: user_x, user_max: user_y }
        } else {
            PairKey { user_min: user_y, user_max: user_x }
        }
    }
}
