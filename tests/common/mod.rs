#![allow(dead_code)]

use std::sync::Once;
use courier::core::AppState;
use courier::database::MemoryStore;
use courier::messaging::NewMessage;
use courier::model::{NewUser, User};
use courier::users::UserService;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn test_state() -> AppState<MemoryStore> {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();
    });
    AppState::new(MemoryStore::new())
}

pub async fn register_user(state: &AppState<MemoryStore>, username: &str) -> User {
    UserService::register_user(state, NewUser { username: username.to_string() })
        .await
        .expect("user registration should succeed")
}

pub fn new_message(sender_id: Uuid, receiver_id: Uuid, content: &str) -> NewMessage {
    NewMessage { sender_id, receiver_id, content: content.to_string() }
}
