use chat_service::config::MessagingConfig;
use chat_service::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{RecordingBroker, chat_rows, get_test_pool, member_rows, registry_with};

fn messaging(operation_timeout_ms: u64) -> MessagingConfig {
    MessagingConfig { operation_timeout_ms, ..MessagingConfig::default() }
}

#[tokio::test]
async fn test_successful_unit_of_work_commits() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let (chat_id, alice) = (Uuid::new_v4(), Uuid::new_v4());

    let members = registry
        .atomic(move |scope| {
            Box::pin(async move {
                let chats = scope.chats();
                chats.create_chat(scope.conn(), chat_id, false).await?;
                chats.add_members(scope.conn(), chat_id, &[alice]).await?;
                Ok(chats.get_chat(scope.conn(), chat_id).await?.members_count)
            })
        })
        .await
        .unwrap();

    assert_eq!(members, 1);
    assert_eq!(chat_rows(&pool, chat_id).await, 1);
}

#[tokio::test]
async fn test_failing_member_insert_leaves_no_chat_behind() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let chat_id = Uuid::new_v4();

    let result = registry
        .atomic(move |scope| {
            Box::pin(async move {
                let chats = scope.chats();
                chats.create_chat(scope.conn(), chat_id, false).await?;
                chats.add_members(scope.conn(), chat_id, &[]).await
            })
        })
        .await;

    assert!(matches!(result, Err(AppError::EmptyMembers)));
    assert_eq!(chat_rows(&pool, chat_id).await, 0);
}

#[tokio::test]
async fn test_errors_are_returned_unchanged() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let chat_id = Uuid::new_v4();

    let result: chat_service::error::Result<()> = registry
        .atomic(move |scope| {
            Box::pin(async move {
                scope.chats().create_chat(scope.conn(), chat_id, true).await?;
                Err(AppError::BusinessLogicViolation("stop here".into()))
            })
        })
        .await;

    let Err(AppError::BusinessLogicViolation(reason)) = result else {
        panic!("unexpected outcome: {result:?}");
    };
    assert_eq!(reason, "stop here");
    assert_eq!(chat_rows(&pool, chat_id).await, 0);
}

#[tokio::test]
async fn test_panic_rolls_back_and_propagates() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let (chat_id, alice) = (Uuid::new_v4(), Uuid::new_v4());

    let task = tokio::spawn(async move {
        registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    chats.create_chat(scope.conn(), chat_id, false).await?;
                    chats.add_members(scope.conn(), chat_id, &[alice]).await?;
                    panic!("operation failed unexpectedly");
                })
            })
            .await
    });

    let joined: Result<chat_service::error::Result<()>, _> = task.await;
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(chat_rows(&pool, chat_id).await, 0);
    assert_eq!(member_rows(&pool, chat_id).await, 0);
}

#[tokio::test]
async fn test_panic_while_building_the_operation_rolls_back_and_propagates() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let chat_id = Uuid::new_v4();
    let broken = true;

    let failing = registry.clone();
    let task = tokio::spawn(async move {
        failing
            .atomic(move |scope| {
                if broken {
                    panic!("operation could not be built");
                }
                Box::pin(async move { scope.chats().create_chat(scope.conn(), chat_id, false).await })
            })
            .await
    });

    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(chat_rows(&pool, chat_id).await, 0);

    registry
        .atomic(move |scope| Box::pin(async move { scope.chats().create_chat(scope.conn(), chat_id, false).await }))
        .await
        .unwrap();
    assert_eq!(chat_rows(&pool, chat_id).await, 1);
}

#[tokio::test]
async fn test_deadline_rolls_back_and_times_out() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &messaging(200));
    let chat_id = Uuid::new_v4();

    let result = registry
        .atomic(move |scope| {
            Box::pin(async move {
                scope.chats().create_chat(scope.conn(), chat_id, false).await?;
                sqlx::query("SELECT pg_sleep(2)").execute(scope.conn()).await?;
                Ok(())
            })
        })
        .await;

    assert!(matches!(result, Err(AppError::Timeout)));
    assert_eq!(chat_rows(&pool, chat_id).await, 0);
}

#[tokio::test]
async fn test_concurrent_creation_of_the_same_chat_has_one_winner() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &MessagingConfig::default());
    let chat_id = Uuid::new_v4();

    let attempt = |registry: chat_service::services::registry::Registry| async move {
        registry
            .atomic(move |scope| {
                Box::pin(async move { scope.chats().create_chat(scope.conn(), chat_id, false).await })
            })
            .await
    };

    let (first, second) = tokio::join!(attempt(registry.clone()), attempt(registry.clone()));

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|outcome| matches!(outcome, Err(AppError::ChatAlreadyExists))));
    assert_eq!(chat_rows(&pool, chat_id).await, 1);
}

#[tokio::test]
async fn test_reads_outside_a_transaction_share_the_deadline() {
    let pool = get_test_pool().await;
    let registry = registry_with(pool.clone(), Arc::new(RecordingBroker::default()), &messaging(200));

    let slow = registry
        .within_deadline(async {
            sqlx::query("SELECT pg_sleep(2)").execute(&pool).await?;
            Ok(())
        })
        .await;
    assert!(matches!(slow, Err(AppError::Timeout)));

    let quick: i32 = registry
        .within_deadline(async { Ok(sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?) })
        .await
        .unwrap();
    assert_eq!(quick, 1);
}
