use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::model::{Conversation, ConversationEntry, Message, PairKey, User, UserMessage};

/// A single failed store operation, attributed to the collection it touched.
#[derive(Debug)]
pub struct StoreError {
    view: &'static str,
    source: Box<dyn Error + Send + Sync>,
}

impl StoreError {
    pub fn new(view: &'static str, source: impl Into<Box<dyn Error + Send + Sync>>) -> StoreError {
        StoreError { view, source: source.into() }
    }

    pub fn view(&self) -> &'static str {
        self.view
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.view, self.source)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Clustering bound for a page scan of the canonical messages view
/// (timestamp DESC, message_id ASC within one conversation partition).
#[derive(Debug, Clone, Copy)]
pub enum MessageBound {
    Unbounded,
    /// Remainder of the cursor's millisecond: same timestamp, ids after the
    /// cursor's message id.
    AtTimestampAfter { timestamp: DateTime<Utc>, message_id: Uuid },
    /// Everything strictly older than the cursor's timestamp.
    Before { timestamp: DateTime<Utc> },
}

/// Clustering bound for the conversations-by-user view
/// (last_message_at DESC, conversation_id ASC).
#[derive(Debug, Clone, Copy)]
pub enum EntryBound {
    Unbounded,
    AtTimestampAfter { last_message_at: DateTime<Utc>, conversation_id: i64 },
    Before { last_message_at: DateTime<Utc> },
}

/// Clustering bound for the messages-by-user view
/// (conversation_id ASC, timestamp DESC, message_id ASC).
#[derive(Debug, Clone, Copy)]
pub enum UserMessageBound {
    Unbounded,
    AtTimestampAfter { conversation_id: i64, timestamp: DateTime<Utc>, message_id: Uuid },
    BeforeInConversation { conversation_id: i64, timestamp: DateTime<Utc> },
    AfterConversation { conversation_id: i64 },
}

/// The four query-shaped views plus the resolver-owned pair index and the
/// users table. Every operation touches exactly one collection; the adapter
/// guarantees per-view durability only. Cross-view consistency is the fan-out
/// coordinator's job, not the store's.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn fetch_user(&self, user_id: &Uuid) -> Result<Option<User>, StoreError>;

    async fn fetch_pair_mapping(&self, pair: &PairKey) -> Result<Option<i64>, StoreError>;
    /// Conditional insert-if-absent on the canonical pair key. Returns the
    /// winning conversation id, which equals `conversation_id` only if this
    /// call created the mapping.
    async fn claim_pair_mapping(&self, pair: &PairKey, conversation_id: i64) -> Result<i64, StoreError>;

    /// Writes identity columns only; activity columns belong to
    /// `update_conversation_activity` and must not be clobbered here.
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;
    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), StoreError>;
    async fn fetch_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>, StoreError>;
    async fn update_conversation_activity(
        &self,
        conversation_id: i64,
        last_message_at: DateTime<Utc>,
        preview: &str,
    ) -> Result<(), StoreError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;
    async fn fetch_message(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
    ) -> Result<Option<Message>, StoreError>;
    async fn fetch_messages(
        &self,
        conversation_id: i64,
        bound: MessageBound,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;
    /// Conditional write: applies only while `read_at` is still unset.
    async fn mark_message_read(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_user_message(&self, user_message: &UserMessage) -> Result<(), StoreError>;
    async fn fetch_user_messages(
        &self,
        user_id: &Uuid,
        bound: UserMessageBound,
        limit: u32,
    ) -> Result<Vec<UserMessage>, StoreError>;

    /// Replaces the participant's entry: removes the row clustered at
    /// `supersedes` (when known) and writes the new one, both within the
    /// user's partition.
    async fn upsert_conversation_entry(
        &self,
        entry: &ConversationEntry,
        supersedes: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
    async fn fetch_conversation_entries(
        &self,
        user_id: &Uuid,
        bound: EntryBound,
        limit: u32,
    ) -> Result<Vec<ConversationEntry>, StoreError>;
}
