use crate::domain::message::{FileAttachment, Message, MessageSelector, OutgoingMessage};
use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize, de};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub mime_type: String,
    pub file_id: String,
}

impl From<Attachment> for FileAttachment {
    fn from(schema: Attachment) -> Self {
        Self { mime_type: schema.mime_type, file_id: schema.file_id }
    }
}

impl From<FileAttachment> for Attachment {
    fn from(attachment: FileAttachment) -> Self {
        Self { mime_type: attachment.mime_type, file_id: attachment.file_id }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub message_id: Uuid,
    pub text: Option<String>,
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SendMessage {
    /// # Errors
    /// Returns `AppError::InvalidArgument` if the message has neither text nor attachments.
    pub fn into_outgoing(self, chat_id: Uuid) -> Result<OutgoingMessage> {
        let text = self.text.filter(|text| !text.is_empty());
        if text.is_none() && self.attachments.is_empty() {
            return Err(AppError::InvalidArgument("a message needs text or attachments".into()));
        }

        Ok(OutgoingMessage {
            message_id: self.message_id,
            chat_id,
            text,
            reply_to: self.reply_to,
            attachments: self.attachments.into_iter().map(Into::into).collect(),
        })
    }
}

/// History window; timestamps are RFC 3339.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    #[serde(default, deserialize_with = "query_timestamp")]
    pub since: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "query_timestamp")]
    pub until: Option<OffsetDateTime>,
    pub count: Option<i64>,
}

/// An unescaped `+` offset in a query string decodes to a space.
fn query_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    OffsetDateTime::parse(&raw.replace(' ', "+"), &Rfc3339).map(Some).map_err(de::Error::custom)
}

impl MessageQuery {
    /// # Errors
    /// Returns `AppError::InvalidArgument` if `count` is outside `1..=max_count`.
    pub fn into_selector(self, chat_id: Uuid, max_count: i64) -> Result<MessageSelector> {
        if let Some(count) = self.count
            && !(1..=max_count).contains(&count)
        {
            return Err(AppError::InvalidArgument(format!("count must be between 1 and {max_count}")));
        }

        Ok(MessageSelector { chat_id, since: self.since, until: self.until, count: self.count })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub from_user: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub sending_time: OffsetDateTime,
    pub text: Option<String>,
    pub reply_to: Option<Uuid>,
    pub attachments: Vec<Attachment>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.message_id,
            chat_id: message.chat_id,
            from_user: message.from_user,
            sending_time: message.sending_time,
            text: message.text,
            reply_to: message.reply_to,
            attachments: message.attachments.into_iter().map(Into::into).collect(),
        }
    }
}
