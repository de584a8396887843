use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;
use crate::conversations::ConversationService;
use crate::core::AppState;
use crate::database::ConversationStore;
use crate::errors::{CourierError, ProjectionFailure, ProjectionStep};
use crate::messaging::model::{NewMessage, SendOutcome};
use crate::model::{ConversationEntry, Message, UserMessage};
use crate::utils::now_millis;

pub struct MessageService;

impl MessageService {

    /// Fans a message out to every view. The canonical write must succeed;
    /// the projection writes that follow are best-effort, reported via
    /// `SendOutcome` and never rolled back or reordered ahead of the
    /// canonical record.
    pub async fn send_message<S: ConversationStore>(
        state: &AppState<S>,
        new_message: NewMessage,
    ) -> Result<SendOutcome, CourierError> {
        let NewMessage { sender_id, receiver_id, content } = new_message;
        let conversation =
            ConversationService::resolve_conversation(state, sender_id, receiver_id).await?;

        // Clustering order must stay meaningful under clock skew: never step
        // behind the newest activity this conversation has recorded.
        let now = now_millis();
        let timestamp = conversation
            .last_message_at
            .map_or(now, |previous| now.max(previous));
        let message = Message::new(
            conversation.conversation_id,
            sender_id,
            receiver_id,
            content,
            timestamp,
        );

        state
            .store
            .insert_message(&message)
            .await
            .map_err(CourierError::WriteFailed)?;

        let mut projection_failures: Vec<ProjectionFailure> = Vec::new();
        let preview = message.preview();

        let copies = [
            (ProjectionStep::SenderMessageCopy, sender_id),
            (ProjectionStep::ReceiverMessageCopy, receiver_id),
        ];
        for (step, user_id) in copies {
            let projection = UserMessage::project(user_id, &message);
            if let Err(err) = state.store.insert_user_message(&projection).await {
                warn!("Fan-out for message {} left {} behind: {}", message.message_id, step, err);
                projection_failures.push(ProjectionFailure { step, source: err });
            }
        }

        if let Err(err) = state
            .store
            .update_conversation_activity(conversation.conversation_id, message.timestamp, &preview)
            .await
        {
            let step = ProjectionStep::ConversationActivity;
            warn!("Fan-out for message {} left {} behind: {}", message.message_id, step, err);
            projection_failures.push(ProjectionFailure { step, source: err });
        }

        // An unchanged clustering position must not be superseded: a delete
        // and an insert of the same row in one batch would let the tombstone
        // win.
        let supersedes = conversation
            .last_message_at
            .filter(|previous| *previous != message.timestamp);
        let entries = [
            (ProjectionStep::SenderConversationEntry, sender_id, receiver_id),
            (ProjectionStep::ReceiverConversationEntry, receiver_id, sender_id),
        ];
        for (step, user_id, other_user_id) in entries {
            let entry = ConversationEntry {
                user_id,
                last_message_at: message.timestamp,
                conversation_id: conversation.conversation_id,
                other_user_id,
                last_message_preview: preview.clone(),
            };
            if let Err(err) = state.store.upsert_conversation_entry(&entry, supersedes).await {
                warn!("Fan-out for message {} left {} behind: {}", message.message_id, step, err);
                projection_failures.push(ProjectionFailure { step, source: err });
            }
        }

        Ok(SendOutcome { message, projection_failures })
    }

    /// Sets `read_at` exactly once. Only the receiver may acknowledge, which
    /// makes the field single-writer; repeated calls return the fixed value.
    pub async fn mark_message_read<S: ConversationStore>(
        state: &AppState<S>,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> Result<Message, CourierError> {
        let message = Self::fetch_message(state, conversation_id, timestamp, message_id).await?;
        if reader_id != message.receiver_id {
            return Err(CourierError::InvalidParticipants(
                "Only the receiver may acknowledge a message.".to_string(),
            ));
        }
        if message.read_at.is_some() {
            return Ok(message);
        }

        let read_at = now_millis();
        state
            .store
            .mark_message_read(conversation_id, timestamp, message_id, read_at)
            .await
            .map_err(CourierError::WriteFailed)?;
        let updated = Self::fetch_message(state, conversation_id, timestamp, message_id).await?;
        // A stale re-read can only be missing our own conditional write;
        // read_at has no other writer.
        Ok(Message { read_at: Some(updated.read_at.unwrap_or(read_at)), ..updated })
    }

    async fn fetch_message<S: ConversationStore>(
        state: &AppState<S>,
        conversation_id: i64,
        timestamp: DateTime<Utc>,
        message_id: Uuid,
    ) -> Result<Message, CourierError> {
        state
            .store
            .fetch_message(conversation_id, timestamp, message_id)
            .await
            .map_err(CourierError::ReadFailed)?
            .ok_or_else(|| {
                CourierError::NotFound(format!(
                    "No message {message_id} in conversation {conversation_id}."
                ))
            })
    }
}
