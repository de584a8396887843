use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use crate::core::cursor::CursorError;
use crate::database::StoreError;

/// Failure taxonomy of the core contract. `InvalidParticipants`, `NotFound`
/// and `InvalidCursor` are caller mistakes; `WriteFailed` and `ReadFailed`
/// mean the store was unavailable and the call is safe to retry.
#[derive(Debug)]
pub enum CourierError {
    InvalidParticipants(String),
    NotFound(String),
    InvalidCursor(CursorError),
    WriteFailed(StoreError),
    ReadFailed(StoreError),
}

impl Display for CourierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CourierError::InvalidParticipants(msg) => write!(f, "Invalid participants: {}", msg),
            CourierError::NotFound(msg) => write!(f, "Entity not found: {}", msg),
            CourierError::InvalidCursor(err) => write!(f, "Invalid pagination cursor: {}", err),
            CourierError::WriteFailed(err) => write!(f, "Store write failed: {}", err),
            CourierError::ReadFailed(err) => write!(f, "Store read failed: {}", err),
        }
    }
}

impl Error for CourierError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CourierError::InvalidCursor(err) => Some(err),
            CourierError::WriteFailed(err) | CourierError::ReadFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CursorError> for CourierError {
    fn from(err: CursorError) -> CourierError {
        CourierError::InvalidCursor(err)
    }
}

/// The fan-out step a projection failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStep {
    SenderMessageCopy,
    ReceiverMessageCopy,
    ConversationActivity,
    SenderConversationEntry,
    ReceiverConversationEntry,
}

impl Display for ProjectionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let step = match self {
            ProjectionStep::SenderMessageCopy => "messages_by_user (sender copy)",
            ProjectionStep::ReceiverMessageCopy => "messages_by_user (receiver copy)",
            ProjectionStep::ConversationActivity => "conversations (activity)",
            ProjectionStep::SenderConversationEntry => "conversations_by_user (sender entry)",
            ProjectionStep::ReceiverConversationEntry => "conversations_by_user (receiver entry)",
        };
        write!(f, "{}", step)
    }
}

/// A derived view missed an update during fan-out. The canonical record is
/// intact and a repair pass can rebuild the projection from it, so this is
/// reported alongside a successful send instead of failing it.
#[derive(Debug)]
pub struct ProjectionFailure {
    pub step: ProjectionStep,
    pub source: StoreError,
}

impl Display for ProjectionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Projection {} missed an update: {}", self.step, self.source)
    }
}

impl Error for ProjectionFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
