mod common;

use common::{new_message, register_user, test_state};
use courier::errors::CourierError;
use courier::messaging::MessageService;
use courier::timeline::TimelineService;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

#[tokio::test]
async fn receiver_sets_read_at_exactly_once() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let sent = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("send should succeed")
        .message;
    assert!(sent.read_at.is_none());

    let acknowledged = MessageService::mark_message_read(
        &state,
        sent.conversation_id,
        sent.timestamp,
        sent.message_id,
        bob.user_id,
    )
    .await
    .expect("receiver acknowledgement should succeed");
    let fixed = acknowledged.read_at.expect("read_at should now be set");

    // A later repeat must not move the fixed value.
    sleep(Duration::from_millis(5)).await;
    let repeated = MessageService::mark_message_read(
        &state,
        sent.conversation_id,
        sent.timestamp,
        sent.message_id,
        bob.user_id,
    )
    .await
    .expect("repeated acknowledgement should succeed");
    assert_eq!(repeated.read_at, Some(fixed));

    let page = TimelineService::conversation_messages(&state, sent.conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content[0].read_at, Some(fixed));
}

#[tokio::test]
async fn only_the_receiver_may_acknowledge() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let sent = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("send should succeed")
        .message;

    let err = MessageService::mark_message_read(
        &state,
        sent.conversation_id,
        sent.timestamp,
        sent.message_id,
        alice.user_id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CourierError::InvalidParticipants(_)));

    let page = TimelineService::conversation_messages(&state, sent.conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert!(page.content[0].read_at.is_none());
}

#[tokio::test]
async fn acknowledging_an_unknown_message_is_not_found() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let sent = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("send should succeed")
        .message;

    let err = MessageService::mark_message_read(
        &state,
        sent.conversation_id,
        sent.timestamp,
        Uuid::new_v4(),
        bob.user_id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CourierError::NotFound(_)));
}
