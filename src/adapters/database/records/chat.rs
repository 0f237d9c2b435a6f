use crate::domain::chat::Chat;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ChatRecord {
    pub(crate) chat_id: Uuid,
    pub(crate) is_direct: bool,
    pub(crate) members_count: i64,
}

impl From<ChatRecord> for Chat {
    fn from(record: ChatRecord) -> Self {
        Self { chat_id: record.chat_id, is_direct: record.is_direct, members_count: record.members_count }
    }
}

/// One row of a user's chat list: the chat joined with its newest message, if any.
#[derive(Debug, sqlx::FromRow)]
pub struct RichChatRecord {
    pub(crate) chat_id: Uuid,
    pub(crate) is_direct: bool,
    pub(crate) message_id: Option<Uuid>,
    pub(crate) from_user: Option<Uuid>,
    pub(crate) reply_to: Option<Uuid>,
    pub(crate) text: Option<String>,
    pub(crate) sending_time: Option<OffsetDateTime>,
}
