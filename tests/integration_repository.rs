use chat_service::adapters::database::chat_repo::{ChatRepository, MessageFilter, SelectOptions, SortOrder};
use chat_service::domain::message::{FileAttachment, Message};
use chat_service::error::AppError;
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

mod common;
use common::get_test_pool;

const T0: OffsetDateTime = datetime!(2024-05-01 08:00 UTC);

fn message_at(chat_id: Uuid, from_user: Uuid, sending_time: OffsetDateTime) -> Message {
    Message {
        message_id: Uuid::new_v4(),
        chat_id,
        from_user,
        sending_time,
        text: Some(format!("sent at {sending_time}")),
        reply_to: None,
        attachments: vec![],
    }
}

async fn chat_with_member(repo: ChatRepository, conn: &mut PgConnection, user_id: Uuid) -> Uuid {
    let chat_id = Uuid::new_v4();
    repo.create_chat(conn, chat_id, false).await.unwrap();
    repo.add_members(conn, chat_id, &[user_id]).await.unwrap();
    chat_id
}

/// Ten messages one hour apart starting at `T0`.
async fn hourly_history(repo: ChatRepository, conn: &mut PgConnection) -> (Uuid, Vec<Message>) {
    let alice = Uuid::new_v4();
    let chat_id = chat_with_member(repo, conn, alice).await;

    let mut messages = Vec::new();
    for hour in 0..10 {
        let message = message_at(chat_id, alice, T0 + Duration::hours(hour));
        repo.put_message(conn, &message).await.unwrap();
        messages.push(message);
    }
    (chat_id, messages)
}

#[tokio::test]
async fn test_messages_since_are_ascending_and_inclusive() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (chat_id, messages) = hourly_history(repo, &mut conn).await;

    let first_three = repo.get_messages_since(&mut conn, chat_id, T0, 3).await.unwrap();
    assert_eq!(first_three, messages[..3].to_vec());

    let from_the_fifth = repo.get_messages_since(&mut conn, chat_id, T0 + Duration::hours(4), 100).await.unwrap();
    assert_eq!(from_the_fifth, messages[4..].to_vec());
}

#[tokio::test]
async fn test_messages_before_are_descending_and_inclusive() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (chat_id, messages) = hourly_history(repo, &mut conn).await;

    let last_five = repo.get_messages_before(&mut conn, chat_id, T0 + Duration::hours(9), 5).await.unwrap();

    let expected: Vec<Message> = messages[5..].iter().rev().cloned().collect();
    assert_eq!(last_five, expected);
}

#[tokio::test]
async fn test_select_messages_combines_filters() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (chat_id, messages) = hourly_history(repo, &mut conn).await;

    let filter = MessageFilter {
        chat_id: Some(chat_id),
        message_ids: Some(messages.iter().map(|m| m.message_id).collect()),
        since: Some(T0 + Duration::hours(2)),
        until: Some(T0 + Duration::hours(6)),
    };
    let window = repo
        .select_messages(&mut conn, &filter, SelectOptions { limit: Some(3), order: SortOrder::Descending })
        .await
        .unwrap();

    let expected: Vec<Message> = messages[4..=6].iter().rev().cloned().collect();
    assert_eq!(window, expected);
}

#[tokio::test]
async fn test_messages_by_id_are_newest_first_and_skip_unknown_ids() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (_, messages) = hourly_history(repo, &mut conn).await;

    let ids = [messages[1].message_id, Uuid::new_v4(), messages[7].message_id];
    let found = repo.get_messages_by_id(&mut conn, &ids).await.unwrap();

    assert_eq!(found, vec![messages[7].clone(), messages[1].clone()]);
}

#[tokio::test]
async fn test_delete_message_removes_exactly_one_row() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (chat_id, messages) = hourly_history(repo, &mut conn).await;

    repo.delete_message(&mut conn, messages[3].message_id).await.unwrap();

    let remaining = repo.get_messages_since(&mut conn, chat_id, T0, 100).await.unwrap();
    assert_eq!(remaining.len(), 9);
    assert!(!remaining.contains(&messages[3]));

    let missing = repo.delete_message(&mut conn, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::MessageNotFound)));
    let again = repo.delete_message(&mut conn, messages[3].message_id).await;
    assert!(matches!(again, Err(AppError::MessageNotFound)));
}

#[tokio::test]
async fn test_deleting_a_replied_message_keeps_the_reply() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let alice = Uuid::new_v4();
    let chat_id = chat_with_member(repo, &mut conn, alice).await;

    let original = message_at(chat_id, alice, T0);
    let mut reply = message_at(chat_id, alice, T0 + Duration::minutes(1));
    reply.reply_to = Some(original.message_id);
    repo.put_message(&mut conn, &original).await.unwrap();
    repo.put_message(&mut conn, &reply).await.unwrap();

    repo.delete_message(&mut conn, original.message_id).await.unwrap();

    let kept = repo.get_messages_by_id(&mut conn, &[reply.message_id]).await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].reply_to, None);
}

#[tokio::test]
async fn test_write_constraints_map_to_domain_errors() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let alice = Uuid::new_v4();
    let chat_id = chat_with_member(repo, &mut conn, alice).await;

    let duplicate_chat = repo.create_chat(&mut conn, chat_id, true).await;
    let members_of_nothing = repo.add_members(&mut conn, Uuid::new_v4(), &[alice]).await;
    let message_to_nowhere = repo.put_message(&mut conn, &message_at(Uuid::new_v4(), alice, T0)).await;

    let mut dangling_reply = message_at(chat_id, alice, T0);
    dangling_reply.reply_to = Some(Uuid::new_v4());
    let reply_to_nothing = repo.put_message(&mut conn, &dangling_reply).await;

    let message = message_at(chat_id, alice, T0);
    repo.put_message(&mut conn, &message).await.unwrap();
    let duplicate_message = repo.put_message(&mut conn, &message).await;

    let duplicate_member = repo.add_members(&mut conn, chat_id, &[alice]).await;

    assert!(matches!(duplicate_chat, Err(AppError::ChatAlreadyExists)));
    assert!(matches!(members_of_nothing, Err(AppError::ChatNotFound)));
    assert!(matches!(message_to_nowhere, Err(AppError::ChatNotFound)));
    assert!(matches!(reply_to_nothing, Err(AppError::RepliedMessageNotFound)));
    assert!(matches!(duplicate_message, Err(AppError::MessageAlreadyExists)));
    assert!(matches!(duplicate_member, Err(AppError::Database(_))), "unexpected: {duplicate_member:?}");
}

#[tokio::test]
async fn test_membership_queries() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let chat_id = chat_with_member(repo, &mut conn, alice).await;
    repo.add_members(&mut conn, chat_id, &[bob, carol]).await.unwrap();

    assert!(repo.user_is_member(&mut conn, chat_id, bob).await.unwrap());
    assert!(!repo.user_is_member(&mut conn, chat_id, Uuid::new_v4()).await.unwrap());
    assert!(matches!(repo.user_is_member(&mut conn, Uuid::new_v4(), alice).await, Err(AppError::ChatNotFound)));

    let removed = repo.remove_members(&mut conn, chat_id, &[bob, Uuid::new_v4()]).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(repo.remove_members(&mut conn, Uuid::new_v4(), &[alice]).await.unwrap(), 0);
    assert!(matches!(repo.remove_members(&mut conn, chat_id, &[]).await, Err(AppError::EmptyMembers)));

    let chat = repo.get_chat_with_members(&mut conn, chat_id).await.unwrap();
    let mut expected = vec![alice, carol];
    expected.sort();
    assert_eq!(chat.member_ids(), expected);
    assert_eq!(chat.chat.members_count, 2);
    assert!(matches!(repo.get_chat(&mut conn, Uuid::new_v4()).await, Err(AppError::ChatNotFound)));
}

#[tokio::test]
async fn test_chat_without_members_is_still_found() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let chat_id = Uuid::new_v4();
    repo.create_chat(&mut conn, chat_id, false).await.unwrap();

    let chat = repo.get_chat(&mut conn, chat_id).await.unwrap();

    assert_eq!(chat.members_count, 0);
}

#[tokio::test]
async fn test_user_chats_have_one_row_per_chat_even_on_timestamp_ties() {
    let pool = get_test_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    let repo = ChatRepository::new();
    let alice = Uuid::new_v4();
    let chat_id = chat_with_member(repo, &mut conn, alice).await;

    let mut first = message_at(chat_id, alice, T0);
    first.attachments = vec![
        FileAttachment { mime_type: "image/jpeg".into(), file_id: "a".into() },
        FileAttachment { mime_type: "image/jpeg".into(), file_id: "b".into() },
    ];
    let second = message_at(chat_id, alice, T0);
    repo.put_message(&mut conn, &first).await.unwrap();
    repo.put_message(&mut conn, &second).await.unwrap();

    let chats = repo.get_user_chats(&mut conn, alice).await.unwrap();

    assert_eq!(chats.len(), 1);
    let newest = if first.message_id > second.message_id { &first } else { &second };
    assert_eq!(chats[0].last_message.as_ref(), Some(newest));
}
