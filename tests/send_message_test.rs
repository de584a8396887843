mod common;

use std::collections::HashSet;
use std::sync::Arc;
use common::{new_message, register_user, test_state};
use courier::conversations::ConversationService;
use courier::errors::{CourierError, ProjectionStep};
use courier::messaging::{MessageService, NewMessage};
use courier::model::PREVIEW_MAX_CHARS;
use courier::timeline::TimelineService;

#[tokio::test]
async fn first_contact_populates_every_view() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let outcome = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("send should succeed");
    assert!(outcome.fully_projected());
    let conversation_id = outcome.message.conversation_id;

    let conversation = ConversationService::get_conversation(&state, conversation_id)
        .await
        .expect("conversation should exist");
    assert_eq!(conversation.last_message_preview.as_deref(), Some("hi"));
    assert_eq!(conversation.last_message_at, Some(outcome.message.timestamp));

    let page = TimelineService::conversation_messages(&state, conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].content, "hi");
    assert!(page.next_cursor.is_none());

    for (user, other) in [(alice.user_id, bob.user_id), (bob.user_id, alice.user_id)] {
        let conversations = TimelineService::user_conversations(&state, user, 10, None)
            .await
            .expect("conversation list should be readable");
        assert_eq!(conversations.content.len(), 1);
        assert_eq!(conversations.content[0].conversation_id, conversation_id);
        assert_eq!(conversations.content[0].other_user_id, other);

        let feed = TimelineService::user_messages(&state, user, 10, None)
            .await
            .expect("user feed should be readable");
        assert_eq!(feed.content.len(), 1);
        assert_eq!(feed.content[0].message_id, outcome.message.message_id);
    }
}

#[tokio::test]
async fn pair_resolution_is_order_independent() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let first = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("first send should succeed");
    let second = MessageService::send_message(&state, new_message(bob.user_id, alice.user_id, "hey"))
        .await
        .expect("second send should succeed");

    assert_eq!(first.message.conversation_id, second.message.conversation_id);
    let conversations = TimelineService::user_conversations(&state, alice.user_id, 10, None)
        .await
        .expect("conversation list should be readable");
    assert_eq!(conversations.content.len(), 1);
}

#[tokio::test]
async fn hi_then_hey_between_fresh_users() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .expect("first send should succeed");
    let hey = MessageService::send_message(&state, new_message(bob.user_id, alice.user_id, "hey"))
        .await
        .expect("second send should succeed");
    let conversation_id = hey.message.conversation_id;

    let page = TimelineService::conversation_messages(&state, conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content.len(), 2);
    let newest = &page.content[0];
    let oldest = &page.content[1];
    assert!(
        newest.timestamp > oldest.timestamp
            || (newest.timestamp == oldest.timestamp && newest.message_id < oldest.message_id)
    );
    if newest.timestamp > oldest.timestamp {
        assert_eq!(newest.content, "hey");
    }

    for user in [alice.user_id, bob.user_id] {
        let conversations = TimelineService::user_conversations(&state, user, 10, None)
            .await
            .expect("conversation list should be readable");
        assert_eq!(conversations.content.len(), 1);
        assert_eq!(conversations.content[0].last_message_preview, "hey");
    }
}

#[tokio::test]
async fn rejects_self_messaging_and_unknown_users() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let stranger = uuid::Uuid::new_v4();

    let selfie = MessageService::send_message(&state, new_message(alice.user_id, alice.user_id, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(selfie, CourierError::InvalidParticipants(_)));

    let unknown = MessageService::send_message(&state, new_message(alice.user_id, stranger, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(unknown, CourierError::InvalidParticipants(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_contact_creates_one_conversation() {
    let state = Arc::new(test_state());
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = Arc::clone(&state);
        let (sender, receiver) = if i % 2 == 0 {
            (alice.user_id, bob.user_id)
        } else {
            (bob.user_id, alice.user_id)
        };
        handles.push(tokio::spawn(async move {
            MessageService::send_message(
                &state,
                NewMessage { sender_id: sender, receiver_id: receiver, content: format!("message {i}") },
            )
            .await
        }));
    }

    let mut conversation_ids = HashSet::new();
    for handle in handles {
        let outcome = handle.await.expect("task should not panic").expect("send should succeed");
        conversation_ids.insert(outcome.message.conversation_id);
    }
    assert_eq!(conversation_ids.len(), 1);

    let conversation_id = *conversation_ids.iter().next().unwrap();
    let page = TimelineService::conversation_messages(&state, conversation_id, 20, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content.len(), 8);

    let conversations = TimelineService::user_conversations(&state, alice.user_id, 10, None)
        .await
        .expect("conversation list should be readable");
    assert_eq!(conversations.content.len(), 1);
}

#[tokio::test]
async fn by_user_projection_outage_is_reported_not_fatal() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "first"))
        .await
        .expect("healthy send should succeed");

    state.store.fail_view("messages_by_user");
    let outcome = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "second"))
        .await
        .expect("send must still succeed when a projection is down");
    state.store.heal_view("messages_by_user");

    assert!(!outcome.fully_projected());
    let steps: Vec<ProjectionStep> = outcome.projection_failures.iter().map(|f| f.step).collect();
    assert_eq!(
        steps,
        vec![ProjectionStep::SenderMessageCopy, ProjectionStep::ReceiverMessageCopy]
    );
    for failure in &outcome.projection_failures {
        assert_eq!(failure.source.view(), "messages_by_user");
    }

    // Canonically visible...
    let page = TimelineService::conversation_messages(&state, outcome.message.conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content.len(), 2);

    // ...but the by-user feed is missing the second message until repaired.
    let feed = TimelineService::user_messages(&state, alice.user_id, 10, None)
        .await
        .expect("user feed should be readable");
    assert_eq!(feed.content.len(), 1);
    assert_eq!(feed.content[0].content, "first");

    // The conversation list view was healthy and did advance.
    let conversations = TimelineService::user_conversations(&state, bob.user_id, 10, None)
        .await
        .expect("conversation list should be readable");
    assert_eq!(conversations.content[0].last_message_preview, "second");
}

#[tokio::test]
async fn canonical_write_failure_aborts_the_fan_out() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    state.store.fail_view("messages");
    let err = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::WriteFailed(_)));
    state.store.heal_view("messages");

    // The resolver created the conversation, but no view saw the message.
    let conversations = TimelineService::user_conversations(&state, alice.user_id, 10, None)
        .await
        .expect("conversation list should be readable");
    assert!(conversations.content.is_empty());
    let feed = TimelineService::user_messages(&state, alice.user_id, 10, None)
        .await
        .expect("user feed should be readable");
    assert!(feed.content.is_empty());
}

#[tokio::test]
async fn long_content_is_previewed_truncated() {
    let state = test_state();
    let alice = register_user(&state, "alice").await;
    let bob = register_user(&state, "bob").await;

    let content = "x".repeat(PREVIEW_MAX_CHARS + 340);
    let outcome = MessageService::send_message(&state, new_message(alice.user_id, bob.user_id, &content))
        .await
        .expect("send should succeed");

    let page = TimelineService::conversation_messages(&state, outcome.message.conversation_id, 10, None)
        .await
        .expect("canonical view should be readable");
    assert_eq!(page.content[0].content.len(), content.len());

    let conversations = TimelineService::user_conversations(&state, bob.user_id, 10, None)
        .await
        .expect("conversation list should be readable");
    assert_eq!(
        conversations.content[0].last_message_preview.chars().count(),
        PREVIEW_MAX_CHARS
    );
}
