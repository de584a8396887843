use serde::Deserialize;
use uuid::Uuid;
use crate::errors::ProjectionFailure;
use crate::model::Message;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

/// Result of a fan-out send. The message is durable in the canonical view;
/// `projection_failures` lists derived views that missed this update and
/// wait for out-of-band repair.
#[derive(Debug)]
pub struct SendOutcome {
    pub message: Message,
    pub projection_failures: Vec<ProjectionFailure>,
}

impl SendOutcome {
    pub fn fully_projected(&self) -> bool {
        self.projection_failures.is_empty()
    }
}
