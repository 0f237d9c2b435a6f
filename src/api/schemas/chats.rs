use crate::api::schemas::messages::MessageResponse;
use crate::domain::chat::{ChatWithMembers, NewChat, RichChat};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChat {
    pub chat_id: Uuid,
    #[serde(default)]
    pub is_direct: bool,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

impl CreateChat {
    /// # Errors
    /// Returns `AppError::InvalidArgument` if a direct chat names no other member.
    pub fn validate(&self) -> Result<()> {
        if self.is_direct && self.members.is_empty() {
            return Err(AppError::InvalidArgument("members of a direct chat must not be empty".into()));
        }
        Ok(())
    }
}

impl From<CreateChat> for NewChat {
    fn from(schema: CreateChat) -> Self {
        Self { chat_id: schema.chat_id, is_direct: schema.is_direct, members: schema.members }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberList {
    pub user_ids: Vec<Uuid>,
}

impl MemberList {
    /// # Errors
    /// Returns `AppError::InvalidArgument` if the list is empty.
    pub fn into_user_ids(self) -> Result<Vec<Uuid>> {
        if self.user_ids.is_empty() {
            return Err(AppError::InvalidArgument("userIds must not be empty".into()));
        }
        Ok(self.user_ids)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub chat_id: Uuid,
    pub is_direct: bool,
    pub members_count: i64,
    pub members: Vec<Uuid>,
}

impl From<ChatWithMembers> for ChatResponse {
    fn from(chat: ChatWithMembers) -> Self {
        let members = chat.member_ids();
        Self {
            chat_id: chat.chat.chat_id,
            is_direct: chat.chat.is_direct,
            members_count: chat.chat.members_count,
            members,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub is_direct: bool,
    pub last_message: Option<MessageResponse>,
}

impl From<RichChat> for ChatSummary {
    fn from(chat: RichChat) -> Self {
        Self { chat_id: chat.chat_id, is_direct: chat.is_direct, last_message: chat.last_message.map(Into::into) }
    }
}
