use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::{Batch, BatchType};
use scylla::statement::{Consistency, Statement};
use tracing::{debug, error, info};
use uuid::Uuid;
use crate::core::MessageDbConfig;
use crate::database::store::{
    ConversationStore, EntryBound, MessageBound, StoreError, UserMessageBound,
};
use crate::model::{Conversation, ConversationEntry, Message, PairKey, User, UserMessage};

const MESSAGE_COLUMNS: &str =
    "conversation_id, timestamp, message_id, sender_id, receiver_id, content, read_at";
const USER_MESSAGE_COLUMNS: &str =
    "user_id, conversation_id, timestamp, message_id, sender_id, receiver_id, content";
const ENTRY_COLUMNS: &str =
    "user_id, last_message_at, conversation_id, other_user_id, last_message_preview";

#[derive(Debug, Clone)]
pub struct ScyllaStore {
    session: Arc<Session>,
}

impl ScyllaStore {
    pub async fn new(config: &MessageDbConfig) -> Result<Self, StoreError> {
        let session = match SessionBuilder::new()
            .known_node(&config.db_url)
            .user(&config.db_user, &config.db_password)
            .build()
            .await
        {
            Ok(session) => {
                info!("Connection to the message database established.");
                session
            }
            Err(err) => {
                error!("Failed to create session to the message database: {:?}", err);
                return Err(StoreError::new("session", err));
            }
        };
        let store = ScyllaStore { session: Arc::new(session) };
        if config.with_db_init {
            store.create_keyspace_with_tables(config).await?;
        }
        store
            .session
            .use_keyspace(&config.db_keyspace, true)
            .await
            .map_err(|err| StoreError::new("session", err))?;
        Ok(store)
    }

    async fn create_keyspace_with_tables(&self, config: &MessageDbConfig) -> Result<(), StoreError> {
        let keyspace = &config.db_keyspace;
        let queries = [
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH REPLICATION = \
                {{'class' : 'NetworkTopologyStrategy', 'replication_factor' : {}}}",
                config.replication_factor
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.users (
                user_id UUID,
                username TEXT,
                created_at TIMESTAMP,
                PRIMARY KEY (user_id)
            )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.conversation_by_pair (
                user_min UUID,
                user_max UUID,
                conversation_id BIGINT,
                PRIMARY KEY ((user_min, user_max))
            )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.conversations (
                conversation_id BIGINT,
                user_a UUID,
                user_b UUID,
                created_at TIMESTAMP,
                last_message_at TIMESTAMP,
                last_message_preview TEXT,
                PRIMARY KEY (conversation_id)
            )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.messages (
                conversation_id BIGINT,
                timestamp TIMESTAMP,
                message_id UUID,
                sender_id UUID,
                receiver_id UUID,
                content TEXT,
                read_at TIMESTAMP,
                PRIMARY KEY ((conversation_id), timestamp, message_id)
            ) WITH CLUSTERING ORDER BY (timestamp DESC, message_id ASC)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.messages_by_user (
                user_id UUID,
                conversation_id BIGINT,
                timestamp TIMESTAMP,
                message_id UUID,
                sender_id UUID,
                receiver_id UUID,
                content TEXT,
                PRIMARY KEY ((user_id), conversation_id, timestamp, message_id)
            ) WITH CLUSTERING ORDER BY (conversation_id ASC, timestamp DESC, message_id ASC)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.conversations_by_user (
                user_id UUID,
                last_message_at TIMESTAMP,
                conversation_id BIGINT,
                other_user_id UUID,
                last_message_preview TEXT,
                PRIMARY KEY ((user_id), last_message_at, conversation_id)
            ) WITH CLUSTERING ORDER BY (last_message_at DESC, conversation_id ASC)"
            ),
        ];
        for query in queries.iter() {
            self.session.query_unpaged(query.as_str(), &[]).await.map_err(|err| {
                error!("Error executing schema statement '{}': {:?}", query, err);
                StoreError::new("schema", err)
            })?;
            debug!("Successfully executed schema statement: '{}'", query);
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for ScyllaStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO users (user_id, username, created_at) VALUES (?, ?, ?)",
                (user.user_id, user.username.as_str(), user.created_at),
            )
            .await
            .map_err(|err| StoreError::new("users", err))?;
        Ok(())
    }

    async fn fetch_user(&self, user_id: &Uuid) -> Result<Option<User>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT user_id, username, created_at FROM users WHERE user_id = ?",
                (user_id,),
            )
            .await
            .map_err(|err| StoreError::new("users", err))?;
        result
            .into_rows_result()
            .map_err(|err| StoreError::new("users", err))?
            .maybe_first_row::<User>()
            .map_err(|err| StoreError::new("users", err))
    }

    async fn fetch_pair_mapping(&self, pair: &PairKey) -> Result<Option<i64>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT conversation_id FROM conversation_by_pair WHERE user_min = ? AND user_max = ?",
                (pair.user_min, pair.user_max),
            )
            .await
            .map_err(|err| StoreError::new("conversation_by_pair", err))?;
        let row = result
            .into_rows_result()
            .map_err(|err| StoreError::new("conversation_by_pair", err))?
            .maybe_first_row::<(i64,)>()
            .map_err(|err| StoreError::new("conversation_by_pair", err))?;
        Ok(row.map(|(conversation_id,)| conversation_id))
    }

    async fn claim_pair_mapping(&self, pair: &PairKey, conversation_id: i64) -> Result<i64, StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO conversation_by_pair (user_min, user_max, conversation_id) \
                VALUES (?, ?, ?) IF NOT EXISTS",
                (pair.user_min, pair.user_max, conversation_id),
            )
            .await
            .map_err(|err| StoreError::new("conversation_by_pair", err))?;

        // The conditional insert serialized racing claims; a serial read
        // observes whichever one won.
        let mut statement = Statement::new(
            "SELECT conversation_id FROM conversation_by_pair WHERE user_min = ? AND user_max = ?",
        );
        statement.set_consistency(Consistency::Serial);
        let result = self
            .session
            .query_unpaged(statement, (pair.user_min, pair.user_max))
            .await
            .map_err(|err| StoreError::new("conversation_by_pair", err))?;
        let (winner,) = result
            .into_rows_result()
            .map_err(|err| StoreError::new("conversation_by_pair", err))?
            .first_row::<(i64,)>()
            .map_err(|err| StoreError::new("conversation_by_pair", err))?;
        Ok(winner)
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO conversations (conversation_id, user_a, user_b, created_at) \
                VALUES (?, ?, ?, ?)",
                (
                    conversation.conversation_id,
                    conversation.user_a,
                    conversation.user_b,
                    conversation.created_at,
                ),
            )
            .await
            .map_err(|err| StoreError::new("conversations", err))?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "DELETE FROM conversations WHERE conversation_id = ?",
                (conversation_id,),
            )
            .await
            .map_err(|err| StoreError::new("conversations", err))?;
        Ok(())
    }

    async fn fetch_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT conversation_id, user_a, user_b, created_at, last_message_at, \
                last_message_preview FROM conversations WHERE conversation_id = ?",
                (conversation_id,),
            )
            .await
            .map_err(|err| StoreError::new("conversations", err))?;
        result
            .into_rows_result()
            .map_err(|err| StoreError::new("conversations", err))?
            .maybe_first_row::<Conversation>()
            .map_err(|err| StoreError::new("conversations", err))
    }

    async fn update_conversation_activity(
        &self,
        conversation_id: i64,
        last_message_at: DateTime<Utc>,
        preview: &str,
    ) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "UPDATE conversations SET last_message_at = ?, last_message_preview = ? \
                WHERE conversation_id = ?",
                (last_message_at, preview, conversation_id),
            )
            .await
            .map_err(|err| StoreError::new("conversations", err))?;
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
                (
                    message.conversation_id,
                    message.timestamp,
                    message.message_id,
                    message.sender_id,
                    message.receiver_id,
                    message.content.as_str(),
                    message.read_at,
                ),
            )
            .await
            .map_err(|err| StoreError::new("messages", err))?;
        Ok(())
    }

    async fn fetch_message(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
    ) -> Result<Option<Message>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                    WHERE conversation_id = ? AND timestamp = ? AND message_id = ?"
                ),
                (conversation_id, timestamp, message_id),
            )
            .await
            .map_err(|err| StoreError::new("messages", err))?;
        result
            .into_rows_result()
            .map_err(|err| StoreError::new("messages", err))?
            .maybe_first_row::<Message>()
            .map_err(|err| StoreError::new("messages", err))
    }

    async fn fetch_messages(
        &self,
        conversation_id: i64,
        bound: MessageBound,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stream = match bound {
            MessageBound::Unbounded => self
                .session
                .query_iter(
                    format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? LIMIT ?"),
                    (conversation_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages", err))?
                .rows_stream::<Message>()
                .map_err(|err| StoreError::new("messages", err))?,
            MessageBound::AtTimestampAfter { timestamp, message_id } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages \
                        WHERE conversation_id = ? AND timestamp = ? AND message_id > ? LIMIT ?"
                    ),
                    (conversation_id, timestamp, message_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages", err))?
                .rows_stream::<Message>()
                .map_err(|err| StoreError::new("messages", err))?,
            MessageBound::Before { timestamp } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages \
                        WHERE conversation_id = ? AND timestamp < ? LIMIT ?"
                    ),
                    (conversation_id, timestamp, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages", err))?
                .rows_stream::<Message>()
                .map_err(|err| StoreError::new("messages", err))?,
        };
        let mut messages: Vec<Message> = Vec::new();
        while let Some(next) = stream.try_next().await.map_err(|err| StoreError::new("messages", err))? {
            messages.push(next);
        }
        Ok(messages)
    }

    async fn mark_message_read(
        &self,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "UPDATE messages SET read_at = ? \
                WHERE conversation_id = ? AND timestamp = ? AND message_id = ? IF read_at = NULL",
                (read_at, conversation_id, timestamp, message_id),
            )
            .await
            .map_err(|err| StoreError::new("messages", err))?;
        Ok(())
    }

    async fn insert_user_message(&self, user_message: &UserMessage) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                format!("INSERT INTO messages_by_user ({USER_MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
                (
                    user_message.user_id,
                    user_message.conversation_id,
                    user_message.timestamp,
                    user_message.message_id,
                    user_message.sender_id,
                    user_message.receiver_id,
                    user_message.content.as_str(),
                ),
            )
            .await
            .map_err(|err| StoreError::new("messages_by_user", err))?;
        Ok(())
    }

    async fn fetch_user_messages(
        &self,
        user_id: &Uuid,
        bound: UserMessageBound,
        limit: u32,
    ) -> Result<Vec<UserMessage>, StoreError> {
        let mut stream = match bound {
            UserMessageBound::Unbounded => self
                .session
                .query_iter(
                    format!("SELECT {USER_MESSAGE_COLUMNS} FROM messages_by_user WHERE user_id = ? LIMIT ?"),
                    (user_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages_by_user", err))?
                .rows_stream::<UserMessage>()
                .map_err(|err| StoreError::new("messages_by_user", err))?,
            UserMessageBound::AtTimestampAfter { conversation_id, timestamp, message_id } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {USER_MESSAGE_COLUMNS} FROM messages_by_user \
                        WHERE user_id = ? AND conversation_id = ? AND timestamp = ? AND message_id > ? \
                        LIMIT ?"
                    ),
                    (user_id, conversation_id, timestamp, message_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages_by_user", err))?
                .rows_stream::<UserMessage>()
                .map_err(|err| StoreError::new("messages_by_user", err))?,
            UserMessageBound::BeforeInConversation { conversation_id, timestamp } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {USER_MESSAGE_COLUMNS} FROM messages_by_user \
                        WHERE user_id = ? AND conversation_id = ? AND timestamp < ? LIMIT ?"
                    ),
                    (user_id, conversation_id, timestamp, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages_by_user", err))?
                .rows_stream::<UserMessage>()
                .map_err(|err| StoreError::new("messages_by_user", err))?,
            UserMessageBound::AfterConversation { conversation_id } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {USER_MESSAGE_COLUMNS} FROM messages_by_user \
                        WHERE user_id = ? AND conversation_id > ? LIMIT ?"
                    ),
                    (user_id, conversation_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("messages_by_user", err))?
                .rows_stream::<UserMessage>()
                .map_err(|err| StoreError::new("messages_by_user", err))?,
        };
        let mut rows: Vec<UserMessage> = Vec::new();
        while let Some(next) = stream.try_next().await.map_err(|err| StoreError::new("messages_by_user", err))? {
            rows.push(next);
        }
        Ok(rows)
    }

    async fn upsert_conversation_entry(
        &self,
        entry: &ConversationEntry,
        supersedes: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        match supersedes {
            Some(prior_last_message_at) => {
                // Delete and insert land in the same partition, so a single
                // logged batch keeps the view free of stale entries.
                let mut batch = Batch::new(BatchType::Logged);
                batch.append_statement(
                    "DELETE FROM conversations_by_user \
                    WHERE user_id = ? AND last_message_at = ? AND conversation_id = ?",
                );
                batch.append_statement(
                    "INSERT INTO conversations_by_user \
                    (user_id, last_message_at, conversation_id, other_user_id, last_message_preview) \
                    VALUES (?, ?, ?, ?, ?)",
                );
                self.session
                    .batch(
                        &batch,
                        (
                            (entry.user_id, prior_last_message_at, entry.conversation_id),
                            (
                                entry.user_id,
                                entry.last_message_at,
                                entry.conversation_id,
                                entry.other_user_id,
                                entry.last_message_preview.as_str(),
                            ),
                        ),
                    )
                    .await
                    .map_err(|err| StoreError::new("conversations_by_user", err))?;
            }
            None => {
                self.session
                    .query_unpaged(
                        format!("INSERT INTO conversations_by_user ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
                        (
                            entry.user_id,
                            entry.last_message_at,
                            entry.conversation_id,
                            entry.other_user_id,
                            entry.last_message_preview.as_str(),
                        ),
                    )
                    .await
                    .map_err(|err| StoreError::new("conversations_by_user", err))?;
            }
        }
        Ok(())
    }

    async fn fetch_conversation_entries(
        &self,
        user_id: &Uuid,
        bound: EntryBound,
        limit: u32,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        let mut stream = match bound {
            EntryBound::Unbounded => self
                .session
                .query_iter(
                    format!("SELECT {ENTRY_COLUMNS} FROM conversations_by_user WHERE user_id = ? LIMIT ?"),
                    (user_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("conversations_by_user", err))?
                .rows_stream::<ConversationEntry>()
                .map_err(|err| StoreError::new("conversations_by_user", err))?,
            EntryBound::AtTimestampAfter { last_message_at, conversation_id } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {ENTRY_COLUMNS} FROM conversations_by_user \
                        WHERE user_id = ? AND last_message_at = ? AND conversation_id > ? LIMIT ?"
                    ),
                    (user_id, last_message_at, conversation_id, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("conversations_by_user", err))?
                .rows_stream::<ConversationEntry>()
                .map_err(|err| StoreError::new("conversations_by_user", err))?,
            EntryBound::Before { last_message_at } => self
                .session
                .query_iter(
                    format!(
                        "SELECT {ENTRY_COLUMNS} FROM conversations_by_user \
                        WHERE user_id = ? AND last_message_at < ? LIMIT ?"
                    ),
                    (user_id, last_message_at, limit as i32),
                )
                .await
                .map_err(|err| StoreError::new("conversations_by_user", err))?
                .rows_stream::<ConversationEntry>()
                .map_err(|err| StoreError::new("conversations_by_user", err))?,
        };
        let mut entries: Vec<ConversationEntry> = Vec::new();
        while let Some(next) = stream.try_next().await.map_err(|err| StoreError::new("conversations_by_user", err))? {
            entries.push(next);
        }
        Ok(entries)
    }
}
