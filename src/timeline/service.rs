use uuid::Uuid;
use crate::conversations::ConversationService;
use crate::core::cursor::{decode_cursor, encode_cursor, Page};
use crate::core::AppState;
use crate::database::{ConversationStore, EntryBound, MessageBound, UserMessageBound};
use crate::errors::CourierError;
use crate::model::{ConversationEntry, Message, UserMessage};
use crate::timeline::model::{ConversationCursor, MessageCursor, UserMessageCursor};

pub const MAX_PAGE_SIZE: u32 = 100;

pub struct TimelineService;

impl TimelineService {

    /// Messages of one conversation, newest first, strictly before the
    /// cursor position. A cursored page needs up to two range reads: the
    /// remainder of the cursor's millisecond, then everything older.
    pub async fn conversation_messages<S: ConversationStore>(
        state: &AppState<S>,
        conversation_id: i64,
        limit: u32,
        before_cursor: Option<&str>,
    ) -> Result<Page<Message>, CourierError> {
        let cursor: Option<MessageCursor> = decode_cursor(before_cursor)?;
        let limit = clamp_limit(limit);
        // An unknown conversation is a client error, not an empty page.
        ConversationService::get_conversation(state, conversation_id).await?;

        let bounds = match cursor {
            None => vec![MessageBound::Unbounded],
            Some(cursor) => vec![
                MessageBound::AtTimestampAfter {
                    timestamp: cursor.timestamp,
                    message_id: cursor.message_id,
                },
                MessageBound::Before { timestamp: cursor.timestamp },
            ],
        };
        let mut content: Vec<Message> = Vec::with_capacity(limit as usize);
        for bound in bounds {
            let remaining = limit - content.len() as u32;
            if remaining == 0 {
                break;
            }
            let rows = state
                .store
                .fetch_messages(conversation_id, bound, remaining)
                .await
                .map_err(CourierError::ReadFailed)?;
            content.extend(rows);
        }

        let next_cursor = if content.len() as u32 == limit {
            content
                .last()
                .map(|last| {
                    encode_cursor(&MessageCursor {
                        timestamp: last.timestamp,
                        message_id: last.message_id,
                    })
                })
                .transpose()?
        } else {
            None
        };
        Ok(Page { next_cursor, content })
    }

    /// A user's conversations ordered by most recent activity.
    pub async fn user_conversations<S: ConversationStore>(
        state: &AppState<S>,
        user_id: Uuid,
        limit: u32,
        before_cursor: Option<&str>,
    ) -> Result<Page<ConversationEntry>, CourierError> {
        let cursor: Option<ConversationCursor> = decode_cursor(before_cursor)?;
        let limit = clamp_limit(limit);

        let bounds = match cursor {
            None => vec![EntryBound::Unbounded],
            Some(cursor) => vec![
                EntryBound::AtTimestampAfter {
                    last_message_at: cursor.last_message_at,
                    conversation_id: cursor.conversation_id,
                },
                EntryBound::Before { last_message_at: cursor.last_message_at },
            ],
        };
        let mut content: Vec<ConversationEntry> = Vec::with_capacity(limit as usize);
        for bound in bounds {
            let remaining = limit - content.len() as u32;
            if remaining == 0 {
                break;
            }
            let rows = state
                .store
                .fetch_conversation_entries(&user_id, bound, remaining)
                .await
                .map_err(CourierError::ReadFailed)?;
            content.extend(rows);
        }

        let next_cursor = if content.len() as u32 == limit {
            content
                .last()
                .map(|last| {
                    encode_cursor(&ConversationCursor {
                        last_message_at: last.last_message_at,
                        conversation_id: last.conversation_id,
                    })
                })
                .transpose()?
        } else {
            None
        };
        Ok(Page { next_cursor, content })
    }

    /// A user's message feed, grouped by conversation and newest first inside
    /// each group. A cursored page needs up to three range reads: the
    /// remainder of the cursor's millisecond, the rest of its conversation,
    /// then the conversations after it.
    pub async fn user_messages<S: ConversationStore>(
        state: &AppState<S>,
        user_id: Uuid,
        limit: u32,
        before_cursor: Option<&str>,
    ) -> Result<Page<UserMessage>, CourierError> {
        let cursor: Option<UserMessageCursor> = decode_cursor(before_cursor)?;
        let limit = clamp_limit(limit);

        let bounds = match cursor {
            None => vec![UserMessageBound::Unbounded],
            Some(cursor) => vec![
                UserMessageBound::AtTimestampAfter {
                    conversation_id: cursor.conversation_id,
                    timestamp: cursor.timestamp,
                    message_id: cursor.message_id,
                },
                UserMessageBound::BeforeInConversation {
                    conversation_id: cursor.conversation_id,
                    timestamp: cursor.timestamp,
                },
                UserMessageBound::AfterConversation { conversation_id: cursor.conversation_id },
            ],
        };
        let mut content: Vec<UserMessage> = Vec::with_capacity(limit as usize);
        for bound in bounds {
            let remaining = limit - content.len() as u32;
            if remaining == 0 {
                break;
            }
            let rows = state
                .store
                .fetch_user_messages(&user_id, bound, remaining)
                .await
                .map_err(CourierError::ReadFailed)?;
            content.extend(rows);
        }

        let next_cursor = if content.len() as u32 == limit {
            content
                .last()
                .map(|last| {
                    encode_cursor(&UserMessageCursor {
                        conversation_id: last.conversation_id,
                        timestamp: last.timestamp,
                        message_id: last.message_id,
                    })
                })
                .transpose()?
        } else {
            None
        };
        Ok(Page { next_cursor, content })
    }
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}
