use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::database::store::{
    ConversationStore, EntryBound, MessageBound, StoreError, UserMessageBound,
};
use crate::model::{Conversation, ConversationEntry, Message, PairKey, User, UserMessage};

/// In-memory rendition of the same collections the Scylla backend keeps,
/// with the clustering order encoded in the map keys. Backs the integration
/// tests and local development; `fail_view` simulates a per-view outage so
/// the fan-out failure policy can be exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    pairs: HashMap<PairKey, i64>,
    conversations: HashMap<i64, Conversation>,
    messages: HashMap<i64, BTreeMap<MessageKey, Message>>,
    user_messages: HashMap<Uuid, BTreeMap<UserMessageKey, UserMessage>>,
    conversation_entries: HashMap<Uuid, BTreeMap<EntryKey, ConversationEntry>>,
    failing_views: HashSet<&'static str>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Writes against `view` fail until `heal_view` is called.
    pub fn fail_view(&self, view: &'static str) {
        self.lock().failing_views.insert(view);
    }

    pub fn heal_view(&self, view: &'static str) {
        self.lock().failing_views.remove(view);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn check_available(&self, view: &'static str) -> Result<(), StoreError> {
        if self.failing_views.contains(view) {
            Err(StoreError::new(view, "simulated outage"))
        } else {
            Ok(())
        }
    }
}

// Clustering order of the canonical messages view: timestamp DESC,
// message_id ASC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MessageKey {
    timestamp: DateTime<Utc>,
    message_id: Uuid,
}

impl Ord for MessageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| self.message_id.cmp(&other.message_id))
    }
}

impl PartialOrd for MessageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Clustering order of messages_by_user: conversation_id ASC, timestamp DESC,
// message_id ASC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UserMessageKey {
    conversation_id: i64,
    timestamp: DateTime<Utc>,
    message_id: Uuid,
}

impl Ord for UserMessageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.conversation_id
            .cmp(&other.conversation_id)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| self.message_id.cmp(&other.message_id))
    }
}

impl PartialOrd for UserMessageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Clustering order of conversations_by_user: last_message_at DESC,
// conversation_id ASC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryKey {
    last_message_at: DateTime<Utc>,
    conversation_id: i64,
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .last_message_at
            .cmp(&self.last_message_at)
            .then_with(|| self.conversation_id.cmp(&other.conversation_id))
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn message_in_bound(bound: &MessageBound, key: &MessageKey) -> bool {
    match *bound {
        MessageBound::Unbounded => true,
        MessageBound::AtTimestampAfter { timestamp, message_id } => {
            key.timestamp == timestamp && key.message_id > message_id
        }
        MessageBound::Before { timestamp } => key.timestamp < timestamp,
    }
}

fn user_message_in_bound(bound: &UserMessageBound, key: &UserMessageKey) -> bool {
    match *bound {
        UserMessageBound::Unbounded => true,
        UserMessageBound::AtTimestampAfter { conversation_id, timestamp, message_id } => {
            key.conversation_id == conversation_id
                && key.timestamp == timestamp
                && key.message_id > message_id
        }
        UserMessageBound::BeforeInConversation { conversation_id, timestamp } => {
            key.conversation_id == conversation_id && key.timestamp < timestamp
        }
        UserMessageBound::AfterConversation { conversation_id } => {
            key.conversation_id > conversation_id
        }
    }
}

fn entry_in_bound(bound: &EntryBound, key: &EntryKey) -> bool {
    match *bound {
        EntryBound::Unbounded => true,
        EntryBound::AtTimestampAfter { last_message_at, conversation_id } => {
            key.last_message_at == last_message_at && key.conversation_id > conversation_id
        }
        EntryBound::Before { last_message_at } => key.last_message_at < last_message_at,
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("users")?;
        inner.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn fetch_user(&self, user_id: &Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(user_id).cloned())
    }

    async fn fetch_pair_mapping(&self, pair: &PairKey) -> Result<Option<i64>, StoreError> {
        Ok(self.lock().pairs.get(pair).copied())
    }

    async fn claim_pair_mapping(&self, pair: &PairKey, conversation_id: i64) -> Result<i64, StoreError> {
        let mut inner = self.lock();
        inner.check_available("conversation_by_pair")?;
        match inner.pairs.entry(*pair) {
            Entry::Occupied(existing) => Ok(*existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(conversation_id);
                Ok(conversation_id)
            }
        }
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("conversations")?;
        inner.conversations.insert(conversation.conversation_id, conversation.clone());
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("conversations")?;
        inner.conversations.remove(&conversation_id);
        Ok(())
    }

    async fn fetch_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>, StoreError> {
        Ok(self.lock().conversations.get(&conversation_id).cloned())
    }

    async fn update_conversation_activity(
        &self,
        conversation_id: i64,
        last_message_at: DateTime<Utc>,
        preview: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("conversations")?;
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            conversation.last_message_at = Some(last_message_at);
            conversation.last_message_preview = Some(preview.to_string());
        }
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("messages")?;
        let key = MessageKey { timestamp: message.timestamp, message_id: message.message_id };
        inner
            .messages
            .entry(message.conversation_id)
            .or_default()
            .insert(key, message.clone());
        Ok(())
    }

    async fn fetch_message(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
    ) -> Result<Option<Message>, StoreError> {
        let inner = self.lock();
        let row = inner
            .messages
            .get(&conversation_id)
            .and_then(|partition| partition.get(&MessageKey { timestamp, message_id }))
            .cloned();
        Ok(row)
    }

    async fn fetch_messages(
        &self,
        conversation_id: i64,
        bound: MessageBound,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.lock();
        let rows = inner
            .messages
            .get(&conversation_id)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(key, _)| message_in_bound(&bound, key))
                    .take(limit as usize)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn mark_message_read(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("messages")?;
        let row = inner
            .messages
            .get_mut(&conversation_id)
            .and_then(|partition| partition.get_mut(&MessageKey { timestamp, message_id }));
        if let Some(message) = row {
            if message.read_at.is_none() {
                message.read_at = Some(read_at);
            }
        }
        Ok(())
    }

    async fn insert_user_message(&self, user_message: &UserMessage) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("messages_by_user")?;
        let key = UserMessageKey {
            conversation_id: user_message.conversation_id,
            timestamp: user_message.timestamp,
            message_id: user_message.message_id,
        };
        inner
            .user_messages
            .entry(user_message.user_id)
            .or_default()
            .insert(key, user_message.clone());
        Ok(())
    }

    async fn fetch_user_messages(
        &self,
        user_id: &Uuid,
        bound: UserMessageBound,
        limit: u32,
    ) -> Result<Vec<UserMessage>, StoreError> {
        let inner = self.lock();
        let rows = inner
            .user_messages
            .get(user_id)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(key, _)| user_message_in_bound(&bound, key))
                    .take(limit as usize)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn upsert_conversation_entry(
        &self,
        entry: &ConversationEntry,
        supersedes: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available("conversations_by_user")?;
        let partition = inner.conversation_entries.entry(entry.user_id).or_default();
        if let Some(prior_last_message_at) = supersedes {
            partition.remove(&EntryKey {
                last_message_at: prior_last_message_at,
                conversation_id: entry.conversation_id,
            });
        }
        let key = EntryKey {
            last_message_at: entry.last_message_at,
            conversation_id: entry.conversation_id,
        };
        partition.insert(key, entry.clone());
        Ok(())
    }

    async fn fetch_conversation_entries(
        &self,
        user_id: &Uuid,
        bound: EntryBound,
        limit: u32,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        let inner = self.lock();
        let entries = inner
            .conversation_entries
            .get(user_id)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(key, _)| entry_in_bound(&bound, key))
                    .take(limit as usize)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }
}
