//! Wire schema of the update envelope published to the broker.

use crate::domain::message::FileAttachment as DomainAttachment;
use crate::domain::update::{Update as DomainUpdate, UpdateEvent};

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct UpdateMeta {
    /// Unix seconds, UTC.
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(string, repeated, tag = "2")]
    pub audience: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct FileAttachment {
    #[prost(string, tag = "1")]
    pub mime_type: String,
    #[prost(string, tag = "2")]
    pub file_id: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ChatCreated {
    #[prost(string, tag = "1")]
    pub chat_id: String,
    #[prost(bool, tag = "2")]
    pub is_direct: bool,
    #[prost(string, repeated, tag = "3")]
    pub members: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MessageSent {
    #[prost(string, tag = "1")]
    pub message_id: String,
    #[prost(string, tag = "2")]
    pub from_user: String,
    #[prost(string, tag = "3")]
    pub chat_id: String,
    #[prost(string, tag = "4")]
    pub text: String,
    #[prost(string, optional, tag = "5")]
    pub reply_to: Option<String>,
    #[prost(message, repeated, tag = "6")]
    pub attachments: Vec<FileAttachment>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MemberAdded {
    #[prost(string, tag = "1")]
    pub chat_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MemberRemoved {
    #[prost(string, tag = "1")]
    pub chat_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Update {
    #[prost(message, optional, tag = "1")]
    pub meta: Option<UpdateMeta>,
    #[prost(oneof = "update::Kind", tags = "2, 3, 4, 5")]
    pub kind: Option<update::Kind>,
}

pub mod update {
    #[derive(Clone, PartialEq, Eq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "2")]
        CreatedChat(super::ChatCreated),
        #[prost(message, tag = "3")]
        Message(super::MessageSent),
        #[prost(message, tag = "4")]
        MemberAdded(super::MemberAdded),
        #[prost(message, tag = "5")]
        MemberRemoved(super::MemberRemoved),
    }
}

impl From<&DomainAttachment> for FileAttachment {
    fn from(attachment: &DomainAttachment) -> Self {
        Self { mime_type: attachment.mime_type.clone(), file_id: attachment.file_id.clone() }
    }
}

impl From<&DomainUpdate> for Update {
    fn from(update: &DomainUpdate) -> Self {
        let meta = UpdateMeta {
            timestamp: update.timestamp.unix_timestamp(),
            audience: update.audience.iter().map(ToString::to_string).collect(),
        };

        let kind = match &update.event {
            UpdateEvent::ChatCreated { chat_id, is_direct, members } => update::Kind::CreatedChat(ChatCreated {
                chat_id: chat_id.to_string(),
                is_direct: *is_direct,
                members: members.iter().map(ToString::to_string).collect(),
            }),
            UpdateEvent::MessageSent { message_id, chat_id, from_user, text, reply_to, attachments } => {
                update::Kind::Message(MessageSent {
                    message_id: message_id.to_string(),
                    from_user: from_user.to_string(),
                    chat_id: chat_id.to_string(),
                    text: text.clone().unwrap_or_default(),
                    reply_to: reply_to.map(|id| id.to_string()),
                    attachments: attachments.iter().map(Into::into).collect(),
                })
            }
            UpdateEvent::MemberAdded { chat_id, user_id } => {
                update::Kind::MemberAdded(MemberAdded { chat_id: chat_id.to_string(), user_id: user_id.to_string() })
            }
            UpdateEvent::MemberRemoved { chat_id, user_id } => update::Kind::MemberRemoved(MemberRemoved {
                chat_id: chat_id.to_string(),
                user_id: user_id.to_string(),
            }),
        };

        Self { meta: Some(meta), kind: Some(kind) }
    }
}
