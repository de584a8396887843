use rand::Rng;
use tracing::warn;
use uuid::Uuid;
use crate::core::AppState;
use crate::database::{ConversationStore, StoreError};
use crate::errors::CourierError;
use crate::model::{Conversation, PairKey};
use crate::utils::now_millis;

pub struct ConversationService;

impl ConversationService {

    /// Finds or lazily creates the single conversation for an unordered user
    /// pair. Concurrent first contacts race on the conditional pair claim;
    /// losers adopt the winner's id instead of erroring.
    pub async fn resolve_conversation<S: ConversationStore>(
        state: &AppState<S>,
        user_x: Uuid,
        user_y: Uuid,
    ) -> Result<Conversation, CourierError> {
        if user_x == user_y {
            return Err(CourierError::InvalidParticipants(
                "A conversation needs two distinct users.".to_string(),
            ));
        }
        let (first, second) = tokio::try_join!(
            state.store.fetch_user(&user_x),
            state.store.fetch_user(&user_y)
        )
        .map_err(CourierError::ReadFailed)?;
        if first.is_none() || second.is_none() {
            return Err(CourierError::InvalidParticipants(
                "Both participants must be registered users.".to_string(),
            ));
        }

        let pair = PairKey::new(user_x, user_y);
        let mapped = state
            .store
            .fetch_pair_mapping(&pair)
            .await
            .map_err(CourierError::ReadFailed)?;
        if let Some(conversation_id) = mapped {
            return Self::mapped_conversation(state, conversation_id).await;
        }

        // First contact. The metadata row goes in before the claim, so a
        // visible mapping always refers to an existing conversation row.
        let candidate = Conversation {
            conversation_id: mint_conversation_id(),
            user_a: pair.user_min,
            user_b: pair.user_max,
            created_at: now_millis(),
            last_message_at: None,
            last_message_preview: None,
        };
        state
            .store
            .insert_conversation(&candidate)
            .await
            .map_err(CourierError::WriteFailed)?;
        let winner = state
            .store
            .claim_pair_mapping(&pair, candidate.conversation_id)
            .await
            .map_err(CourierError::WriteFailed)?;
        if winner == candidate.conversation_id {
            return Ok(candidate);
        }

        // Lost the race: drop the orphaned candidate row and adopt the winner.
        if let Err(err) = state.store.delete_conversation(candidate.conversation_id).await {
            warn!(
                "Failed to clean up orphaned conversation row {}: {}",
                candidate.conversation_id, err
            );
        }
        Self::mapped_conversation(state, winner).await
    }

    pub async fn get_conversation<S: ConversationStore>(
        state: &AppState<S>,
        conversation_id: i64,
    ) -> Result<Conversation, CourierError> {
        state
            .store
            .fetch_conversation(conversation_id)
            .await
            .map_err(CourierError::ReadFailed)?
            .ok_or_else(|| CourierError::NotFound(format!("No conversation with id {conversation_id}.")))
    }

    async fn mapped_conversation<S: ConversationStore>(
        state: &AppState<S>,
        conversation_id: i64,
    ) -> Result<Conversation, CourierError> {
        match state
            .store
            .fetch_conversation(conversation_id)
            .await
            .map_err(CourierError::ReadFailed)?
        {
            Some(conversation) => Ok(conversation),
            None => Err(CourierError::ReadFailed(StoreError::new(
                "conversations",
                "missing metadata row for a mapped pair",
            ))),
        }
    }
}

fn mint_conversation_id() -> i64 {
    // No shared counter; uniqueness is arbitrated by the conditional pair
    // claim, so a random draw from the positive 63-bit space suffices.
    rand::rng().random_range(1..=i64::MAX)
}
