use super::constraints::map_write_error;
use crate::adapters::database::records::{AttachmentRecord, ChatRecord, MessageRecord, RichChatRecord};
use crate::domain::chat::{Chat, ChatMember, ChatWithMembers, RichChat};
use crate::domain::message::{FileAttachment, Message};
use crate::error::{AppError, Result};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "message_id, chat_id, from_user, reply_to, text, sending_time";

/// Conditions a message must satisfy to be selected. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub chat_id: Option<Uuid>,
    pub message_ids: Option<Vec<Uuid>>,
    /// Inclusive lower bound on the sending time.
    pub since: Option<OffsetDateTime>,
    /// Inclusive upper bound on the sending time.
    pub until: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub limit: Option<i64>,
    /// Order by sending time; ties are broken by message id in the same direction.
    pub order: SortOrder,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChatRepository {}

impl ChatRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a new chat.
    ///
    /// # Errors
    /// Returns `AppError::ChatAlreadyExists` if the id is taken.
    /// Returns `AppError::Database` if the insert fails otherwise.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn create_chat(&self, conn: &mut PgConnection, chat_id: Uuid, is_direct: bool) -> Result<()> {
        sqlx::query("INSERT INTO chats (chat_id, is_direct) VALUES ($1, $2)")
            .bind(chat_id)
            .bind(is_direct)
            .execute(conn)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// Adds users to a chat.
    ///
    /// # Errors
    /// Returns `AppError::EmptyMembers` if `user_ids` is empty.
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    /// Returns `AppError::Database` if a user is already a member.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(count = user_ids.len()))]
    pub async fn add_members(&self, conn: &mut PgConnection, chat_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        if user_ids.is_empty() {
            return Err(AppError::EmptyMembers);
        }

        sqlx::query(
            r#"
            INSERT INTO chat_members (chat_id, user_id)
            SELECT $1, member FROM UNNEST($2::uuid[]) AS member
            "#,
        )
        .bind(chat_id)
        .bind(user_ids)
        .execute(conn)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    /// Removes users from a chat and returns how many memberships were deleted.
    ///
    /// Unknown chats and non-members are not reported separately; they simply delete nothing.
    ///
    /// # Errors
    /// Returns `AppError::EmptyMembers` if `user_ids` is empty.
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(count = user_ids.len()))]
    pub async fn remove_members(&self, conn: &mut PgConnection, chat_id: Uuid, user_ids: &[Uuid]) -> Result<u64> {
        if user_ids.is_empty() {
            return Err(AppError::EmptyMembers);
        }

        let result = sqlx::query("DELETE FROM chat_members WHERE chat_id = $1 AND user_id = ANY($2)")
            .bind(chat_id)
            .bind(user_ids)
            .execute(conn)
            .await
            .map_err(map_write_error)?;
        Ok(result.rows_affected())
    }

    /// Fetches a chat together with its member count.
    ///
    /// # Errors
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn get_chat(&self, conn: &mut PgConnection, chat_id: Uuid) -> Result<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(
            r#"
            SELECT c.chat_id, c.is_direct, COUNT(m.user_id) AS members_count
            FROM chats c
            LEFT JOIN chat_members m ON m.chat_id = c.chat_id
            WHERE c.chat_id = $1
            GROUP BY c.chat_id, c.is_direct
            "#,
        )
        .bind(chat_id)
        .fetch_optional(conn)
        .await?;

        record.map(Into::into).ok_or(AppError::ChatNotFound)
    }

    /// Fetches a chat and its members ordered by user id.
    ///
    /// # Errors
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn get_chat_with_members(&self, conn: &mut PgConnection, chat_id: Uuid) -> Result<ChatWithMembers> {
        let chat = self.get_chat(&mut *conn, chat_id).await?;

        let members = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM chat_members WHERE chat_id = $1 ORDER BY chat_id, user_id",
        )
        .bind(chat_id)
        .fetch_all(conn)
        .await?;

        Ok(ChatWithMembers { chat, members: members.into_iter().map(|user_id| ChatMember { user_id }).collect() })
    }

    /// Checks whether a user belongs to a chat.
    ///
    /// # Errors
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn user_is_member(&self, conn: &mut PgConnection, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.get_chat(&mut *conn, chat_id).await?;

        let is_member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM chat_members WHERE chat_id = $1 AND user_id = $2)",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(is_member)
    }

    /// Stores a message and its attachments.
    ///
    /// # Errors
    /// Returns `AppError::RepliedMessageNotFound` if `reply_to` references an unknown message.
    /// Returns `AppError::ChatNotFound` if the chat does not exist.
    /// Returns `AppError::MessageAlreadyExists` if the message id is taken.
    #[tracing::instrument(
        level = "debug",
        skip(self, conn, message),
        fields(message_id = %message.message_id, chat_id = %message.chat_id)
    )]
    pub async fn put_message(&self, conn: &mut PgConnection, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (message_id, chat_id, from_user, reply_to, text, sending_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.message_id)
        .bind(message.chat_id)
        .bind(message.from_user)
        .bind(message.reply_to)
        .bind(message.text.as_deref())
        .bind(message.sending_time)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        if message.attachments.is_empty() {
            return Ok(());
        }

        let (mime_types, file_ids): (Vec<&str>, Vec<&str>) =
            message.attachments.iter().map(|a| (a.mime_type.as_str(), a.file_id.as_str())).unzip();

        sqlx::query(
            r#"
            INSERT INTO attachments (message_id, position, mime_type, file_id)
            SELECT $1, (t.ord - 1)::int, t.mime_type, t.file_id
            FROM UNNEST($2::text[], $3::text[]) WITH ORDINALITY AS t(mime_type, file_id, ord)
            "#,
        )
        .bind(message.message_id)
        .bind(&mime_types[..])
        .bind(&file_ids[..])
        .execute(conn)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    /// Filtered, ordered and limited read of messages, attachments included.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn select_messages(
        &self,
        conn: &mut PgConnection,
        filter: &MessageFilter,
        options: SelectOptions,
    ) -> Result<Vec<Message>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(MESSAGE_COLUMNS).push(" FROM messages WHERE TRUE");

        if let Some(chat_id) = filter.chat_id {
            builder.push(" AND chat_id = ").push_bind(chat_id);
        }
        if let Some(message_ids) = &filter.message_ids {
            builder.push(" AND message_id = ANY(").push_bind(message_ids.clone()).push(")");
        }
        if let Some(since) = filter.since {
            builder.push(" AND sending_time >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            builder.push(" AND sending_time <= ").push_bind(until);
        }

        let order = options.order.as_sql();
        builder.push(" ORDER BY sending_time ").push(order).push(", message_id ").push(order);

        if let Some(limit) = options.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let records = builder.build_query_as::<MessageRecord>().fetch_all(&mut *conn).await?;
        let mut messages: Vec<Message> = records.into_iter().map(Into::into).collect();

        self.load_attachments(conn, messages.iter_mut()).await?;

        Ok(messages)
    }

    /// Messages of a chat sent at or after `since`, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn get_messages_since(
        &self,
        conn: &mut PgConnection,
        chat_id: Uuid,
        since: OffsetDateTime,
        count: i64,
    ) -> Result<Vec<Message>> {
        let filter = MessageFilter { chat_id: Some(chat_id), since: Some(since), ..MessageFilter::default() };
        self.select_messages(conn, &filter, SelectOptions { limit: Some(count), order: SortOrder::Ascending }).await
    }

    /// Messages of a chat sent at or before `before`, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn get_messages_before(
        &self,
        conn: &mut PgConnection,
        chat_id: Uuid,
        before: OffsetDateTime,
        count: i64,
    ) -> Result<Vec<Message>> {
        let filter = MessageFilter { chat_id: Some(chat_id), until: Some(before), ..MessageFilter::default() };
        self.select_messages(conn, &filter, SelectOptions { limit: Some(count), order: SortOrder::Descending }).await
    }

    /// Messages with the given ids, newest first. Unknown ids are skipped.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn get_messages_by_id(&self, conn: &mut PgConnection, message_ids: &[Uuid]) -> Result<Vec<Message>> {
        let filter = MessageFilter { message_ids: Some(message_ids.to_vec()), ..MessageFilter::default() };
        self.select_messages(conn, &filter, SelectOptions { limit: None, order: SortOrder::Descending }).await
    }

    /// Deletes a single message.
    ///
    /// # Errors
    /// Returns `AppError::MessageNotFound` if no message has this id.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn delete_message(&self, conn: &mut PgConnection, message_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM messages WHERE message_id = $1").bind(message_id).execute(conn).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::MessageNotFound);
        }
        Ok(())
    }

    /// Every chat the user belongs to with its newest message, most recently active first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn get_user_chats(&self, conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<RichChat>> {
        let records = sqlx::query_as::<_, RichChatRecord>(
            r#"
            SELECT c.chat_id, c.is_direct,
                   last.message_id, last.from_user, last.reply_to, last.text, last.sending_time
            FROM chat_members mem
            JOIN chats c ON c.chat_id = mem.chat_id
            LEFT JOIN LATERAL (
                SELECT message_id, from_user, reply_to, text, sending_time
                FROM messages
                WHERE messages.chat_id = c.chat_id
                ORDER BY sending_time DESC, message_id DESC
                LIMIT 1
            ) last ON TRUE
            WHERE mem.user_id = $1
            ORDER BY last.sending_time DESC NULLS LAST, c.chat_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut chats: Vec<RichChat> = records
            .into_iter()
            .map(|record| {
                let last_message = match (record.message_id, record.from_user, record.sending_time) {
                    (Some(message_id), Some(from_user), Some(sending_time)) => Some(Message {
                        message_id,
                        chat_id: record.chat_id,
                        from_user,
                        sending_time,
                        text: record.text,
                        reply_to: record.reply_to,
                        attachments: Vec::new(),
                    }),
                    _ => None,
                };
                RichChat { chat_id: record.chat_id, is_direct: record.is_direct, last_message }
            })
            .collect();

        self.load_attachments(conn, chats.iter_mut().filter_map(|chat| chat.last_message.as_mut())).await?;

        Ok(chats)
    }

    async fn load_attachments<'m>(
        &self,
        conn: &mut PgConnection,
        messages: impl Iterator<Item = &'m mut Message>,
    ) -> Result<()> {
        let mut messages: Vec<&mut Message> = messages.collect();
        if messages.is_empty() {
            return Ok(());
        }

        let message_ids: Vec<Uuid> = messages.iter().map(|m| m.message_id).collect();
        let records = sqlx::query_as::<_, AttachmentRecord>(
            r#"
            SELECT message_id, mime_type, file_id
            FROM attachments
            WHERE message_id = ANY($1)
            ORDER BY message_id, position
            "#,
        )
        .bind(&message_ids[..])
        .fetch_all(conn)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<FileAttachment>> = HashMap::new();
        for record in records {
            by_message.entry(record.message_id).or_default().push(record.into());
        }

        for message in &mut messages {
            if let Some(attachments) = by_message.remove(&message.message_id) {
                message.attachments = attachments;
            }
        }
        Ok(())
    }
}
