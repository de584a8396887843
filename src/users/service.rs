use uuid::Uuid;
use crate::core::AppState;
use crate::database::ConversationStore;
use crate::errors::CourierError;
use crate::model::{NewUser, User};

pub struct UserService;

impl UserService {

    pub async fn register_user<S: ConversationStore>(
        state: &AppState<S>,
        new_user: NewUser,
    ) -> Result<User, CourierError> {
        let user = User::new(new_user.username);
        state
            .store
            .insert_user(&user)
            .await
            .map_err(CourierError::WriteFailed)?;
        Ok(user)
    }

    pub async fn fetch_user<S: ConversationStore>(
        state: &AppState<S>,
        user_id: Uuid,
    ) -> Result<User, CourierError> {
        state
            .store
            .fetch_user(&user_id)
            .await
            .map_err(CourierError::ReadFailed)?
            .ok_or_else(|| CourierError::NotFound(format!("No user with id {user_id}.")))
    }
}
