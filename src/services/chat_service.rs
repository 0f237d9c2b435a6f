use crate::adapters::database::chat_repo::{ChatRepository, MessageFilter, SelectOptions, SortOrder};
use crate::config::MessagingConfig;
use crate::domain::caller::Caller;
use crate::domain::chat::{ChatWithMembers, NewChat, RichChat};
use crate::domain::message::{Message, MessageSelector, OutgoingMessage};
use crate::error::{AppError, Result};
use crate::services::registry::Registry;
use opentelemetry::{KeyValue, global, metrics::Counter};
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) chats_created_total: Counter<u64>,
    pub(crate) messages_sent_total: Counter<u64>,
    pub(crate) membership_changes_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("chat-service");
        Self {
            chats_created_total: meter
                .u64_counter("chat_chats_created_total")
                .with_description("Total chat creation attempts")
                .build(),
            messages_sent_total: meter
                .u64_counter("chat_messages_sent_total")
                .with_description("Total message send attempts")
                .build(),
            membership_changes_total: meter
                .u64_counter("chat_membership_changes_total")
                .with_description("Total membership change attempts by direction")
                .build(),
        }
    }
}

fn record(counter: &Counter<u64>, succeeded: bool, extra: &[KeyValue]) {
    let status = if succeeded { "success" } else { "failure" };
    let mut attributes = Vec::with_capacity(extra.len() + 1);
    attributes.extend_from_slice(extra);
    attributes.push(KeyValue::new("status", status));
    counter.add(1, &attributes);
}

fn require_caller(caller: Option<&Caller>) -> Result<Uuid> {
    let user_id = caller.map(|caller| caller.user_id).ok_or(AppError::AuthenticationRequired)?;
    tracing::Span::current().record("user_id", tracing::field::display(user_id));
    Ok(user_id)
}

/// Postgres keeps microseconds; truncating up front keeps returned and stored values equal.
fn now_micros() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000).unwrap_or(now)
}

async fn ensure_member(chats: ChatRepository, conn: &mut PgConnection, chat_id: Uuid, user_id: Uuid) -> Result<()> {
    if chats.user_is_member(conn, chat_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::UserIsNotAChatMember)
    }
}

async fn audience(chats: ChatRepository, conn: &mut PgConnection, chat_id: Uuid) -> Result<Vec<Uuid>> {
    Ok(chats.get_chat_with_members(conn, chat_id).await?.member_ids())
}

/// Chat use-cases. Every write runs as exactly one unit of work.
#[derive(Clone, Debug)]
pub struct ChatService {
    registry: Registry,
    config: MessagingConfig,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(registry: Registry, config: MessagingConfig) -> Self {
        Self { registry, config, metrics: Metrics::new() }
    }

    /// Creates a chat whose members are the requested users plus the caller.
    ///
    /// # Errors
    /// Returns `AppError::AuthenticationRequired` without a caller.
    /// Returns `AppError::BusinessLogicViolation` if a direct chat would not have exactly two members.
    /// Returns `AppError::ChatAlreadyExists` if the chat id is taken.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, caller, chat),
        fields(chat_id = %chat.chat_id, is_direct = chat.is_direct, user_id = tracing::field::Empty)
    )]
    pub async fn create_chat(&self, caller: Option<&Caller>, chat: NewChat) -> Result<()> {
        let creator = require_caller(caller)?;
        let members = chat.members_with(creator);
        if chat.is_direct && members.len() != 2 {
            return Err(AppError::BusinessLogicViolation("a direct chat must have exactly two members".into()));
        }

        let NewChat { chat_id, is_direct, .. } = chat;
        let result = self
            .registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    chats.create_chat(scope.conn(), chat_id, is_direct).await?;
                    chats.add_members(scope.conn(), chat_id, &members).await?;
                    scope.updates().chat_created(now_micros(), &members, chat_id, is_direct, &members).await
                })
            })
            .await;

        record(&self.metrics.chats_created_total, result.is_ok(), &[KeyValue::new("direct", is_direct)]);
        if result.is_ok() {
            tracing::info!("Chat created");
        }
        result
    }

    /// Returns the chat and its members, provided the caller is one of them.
    ///
    /// # Errors
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    /// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, caller),
        fields(chat_id = %chat_id, user_id = tracing::field::Empty)
    )]
    pub async fn get_chat_with_members(&self, caller: Option<&Caller>, chat_id: Uuid) -> Result<ChatWithMembers> {
        let user_id = require_caller(caller)?;

        self.registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    ensure_member(chats, scope.conn(), chat_id, user_id).await?;
                    chats.get_chat_with_members(scope.conn(), chat_id).await
                })
            })
            .await
    }

    /// Adds users to a chat the caller belongs to.
    ///
    /// Before the insert, one member-added update per current member is published, each
    /// addressed to the whole current audience.
    ///
    /// # Errors
    /// Returns `AppError::EmptyMembers` if `users` is empty.
    /// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
    /// Returns `AppError::Database` if a user is already a member.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, caller, users),
        fields(chat_id = %chat_id, count = users.len(), user_id = tracing::field::Empty)
    )]
    pub async fn add_chat_members(&self, caller: Option<&Caller>, chat_id: Uuid, users: Vec<Uuid>) -> Result<()> {
        let user_id = require_caller(caller)?;
        if users.is_empty() {
            return Err(AppError::EmptyMembers);
        }

        let result = self
            .registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    ensure_member(chats, scope.conn(), chat_id, user_id).await?;

                    let audience = audience(chats, scope.conn(), chat_id).await?;
                    let timestamp = now_micros();
                    for recipient in &audience {
                        scope.updates().member_added(timestamp, &audience, chat_id, *recipient).await?;
                    }

                    chats.add_members(scope.conn(), chat_id, &users).await
                })
            })
            .await;

        record(&self.metrics.membership_changes_total, result.is_ok(), &[KeyValue::new("direction", "added")]);
        result
    }

    /// Removes users from a chat the caller belongs to.
    ///
    /// Publishes one member-removed update per current member before the delete. Users that
    /// are not members are ignored.
    ///
    /// # Errors
    /// Returns `AppError::EmptyMembers` if `users` is empty.
    /// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, caller, users),
        fields(chat_id = %chat_id, count = users.len(), user_id = tracing::field::Empty)
    )]
    pub async fn delete_chat_members(&self, caller: Option<&Caller>, chat_id: Uuid, users: Vec<Uuid>) -> Result<()> {
        let user_id = require_caller(caller)?;
        if users.is_empty() {
            return Err(AppError::EmptyMembers);
        }

        let result = self
            .registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    ensure_member(chats, scope.conn(), chat_id, user_id).await?;

                    let audience = audience(chats, scope.conn(), chat_id).await?;
                    let timestamp = now_micros();
                    for recipient in &audience {
                        scope.updates().member_removed(timestamp, &audience, chat_id, *recipient).await?;
                    }

                    let removed = chats.remove_members(scope.conn(), chat_id, &users).await?;
                    tracing::debug!(removed, "Members removed");
                    Ok(())
                })
            })
            .await;

        record(&self.metrics.membership_changes_total, result.is_ok(), &[KeyValue::new("direction", "removed")]);
        result
    }

    /// Stores a message from the caller and announces it to every chat member.
    ///
    /// # Errors
    /// Returns `AppError::UserIsNotAChatMember` if the sender is not a member.
    /// Returns `AppError::RepliedMessageNotFound` if the reply target does not exist.
    /// Returns `AppError::BusinessLogicViolation` if the reply target belongs to another chat.
    /// Returns `AppError::MessageAlreadyExists` if the message id is taken.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, sender, message),
        fields(chat_id = %message.chat_id, message_id = %message.message_id, user_id = tracing::field::Empty)
    )]
    pub async fn send_message(&self, sender: Option<&Caller>, message: OutgoingMessage) -> Result<Message> {
        let sender_id = require_caller(sender)?;

        let result = self
            .registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    ensure_member(chats, scope.conn(), message.chat_id, sender_id).await?;

                    if let Some(reply_to) = message.reply_to {
                        let replied = chats.get_messages_by_id(scope.conn(), &[reply_to]).await?;
                        let replied = replied.first().ok_or(AppError::RepliedMessageNotFound)?;
                        if replied.chat_id != message.chat_id {
                            return Err(AppError::BusinessLogicViolation(
                                "a reply must target a message of the same chat".into(),
                            ));
                        }
                    }

                    let timestamp = now_micros();
                    let message = message.into_message(sender_id, timestamp);
                    chats.put_message(scope.conn(), &message).await?;

                    let audience = audience(chats, scope.conn(), message.chat_id).await?;
                    scope.updates().message_sent(timestamp, &audience, &message).await?;
                    Ok(message)
                })
            })
            .await;

        record(&self.metrics.messages_sent_total, result.is_ok(), &[]);
        if result.is_ok() {
            tracing::debug!("Message stored and announced");
        }
        result
    }

    /// Returns a page of chat history in ascending sending order.
    ///
    /// # Errors
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    /// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, caller, selector),
        fields(chat_id = %selector.chat_id, user_id = tracing::field::Empty)
    )]
    pub async fn get_messages(&self, caller: Option<&Caller>, selector: MessageSelector) -> Result<Vec<Message>> {
        let user_id = require_caller(caller)?;
        let chat_id = selector.chat_id;
        let filter = MessageFilter {
            chat_id: Some(chat_id),
            message_ids: None,
            since: selector.since,
            until: selector.until,
        };
        let options = SelectOptions {
            limit: Some(selector.count.unwrap_or(self.config.default_page_size)),
            order: SortOrder::Ascending,
        };

        let messages = self
            .registry
            .atomic(move |scope| {
                Box::pin(async move {
                    let chats = scope.chats();
                    ensure_member(chats, scope.conn(), chat_id, user_id).await?;
                    chats.select_messages(scope.conn(), &filter, options).await
                })
            })
            .await?;

        tracing::debug!(count = messages.len(), "History page loaded");
        Ok(messages)
    }

    /// Lists the caller's chats, most recently active first, each with its newest message.
    ///
    /// # Errors
    /// Returns `AppError::AuthenticationRequired` without a caller.
    /// Returns `AppError::Database` if the chats cannot be loaded.
    /// Returns `AppError::Timeout` if the operation deadline expires first.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = tracing::field::Empty))]
    pub async fn get_users_chats(&self, caller: Option<&Caller>) -> Result<Vec<RichChat>> {
        let user_id = require_caller(caller)?;

        let chats = self.registry.chats();
        self.registry
            .within_deadline(async {
                let mut conn = self.registry.pool().acquire().await?;
                chats.get_user_chats(&mut conn, user_id).await
            })
            .await
    }
}
