use crate::domain::message::{FileAttachment, Message};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) message_id: Uuid,
    pub(crate) chat_id: Uuid,
    pub(crate) from_user: Uuid,
    pub(crate) reply_to: Option<Uuid>,
    pub(crate) text: Option<String>,
    pub(crate) sending_time: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            message_id: record.message_id,
            chat_id: record.chat_id,
            from_user: record.from_user,
            sending_time: record.sending_time,
            text: record.text,
            reply_to: record.reply_to,
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttachmentRecord {
    pub(crate) message_id: Uuid,
    pub(crate) mime_type: String,
    pub(crate) file_id: String,
}

impl From<AttachmentRecord> for FileAttachment {
    fn from(record: AttachmentRecord) -> Self {
        Self { mime_type: record.mime_type, file_id: record.file_id }
    }
}
