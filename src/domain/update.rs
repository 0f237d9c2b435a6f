use crate::domain::message::FileAttachment;
use time::OffsetDateTime;
use uuid::Uuid;

/// Notification of one committed change, addressed to an audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub timestamp: OffsetDateTime,
    pub audience: Vec<Uuid>,
    pub event: UpdateEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    ChatCreated {
        chat_id: Uuid,
        is_direct: bool,
        members: Vec<Uuid>,
    },
    MessageSent {
        message_id: Uuid,
        chat_id: Uuid,
        from_user: Uuid,
        text: Option<String>,
        reply_to: Option<Uuid>,
        attachments: Vec<FileAttachment>,
    },
    MemberAdded {
        chat_id: Uuid,
        user_id: Uuid,
    },
    MemberRemoved {
        chat_id: Uuid,
        user_id: Uuid,
    },
}

impl UpdateEvent {
    /// The chat this event belongs to; used as the broker partition key.
    #[must_use]
    pub const fn chat_id(&self) -> Uuid {
        match self {
            Self::ChatCreated { chat_id, .. }
            | Self::MessageSent { chat_id, .. }
            | Self::MemberAdded { chat_id, .. }
            | Self::MemberRemoved { chat_id, .. } => *chat_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ChatCreated { .. } => "chat_created",
            Self::MessageSent { .. } => "message_sent",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
        }
    }
}
