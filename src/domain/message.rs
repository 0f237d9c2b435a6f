use time::OffsetDateTime;
use uuid::Uuid;

/// Reference to a file stored outside this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub mime_type: String,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub from_user: Uuid,
    pub sending_time: OffsetDateTime,
    pub text: Option<String>,
    pub reply_to: Option<Uuid>,
    pub attachments: Vec<FileAttachment>,
}

/// A message as submitted by its sender, before the server stamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub text: Option<String>,
    pub reply_to: Option<Uuid>,
    pub attachments: Vec<FileAttachment>,
}

impl OutgoingMessage {
    #[must_use]
    pub fn into_message(self, from_user: Uuid, sending_time: OffsetDateTime) -> Message {
        Message {
            message_id: self.message_id,
            chat_id: self.chat_id,
            from_user,
            sending_time,
            text: self.text,
            reply_to: self.reply_to,
            attachments: self.attachments,
        }
    }
}

/// Window of a chat's history requested by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSelector {
    pub chat_id: Uuid,
    pub since: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
    pub count: Option<i64>,
}
