use crate::domain::message::Message;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub chat_id: Uuid,
    pub is_direct: bool,
    pub members_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChatMember {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatWithMembers {
    pub chat: Chat,
    pub members: Vec<ChatMember>,
}

impl ChatWithMembers {
    /// User ids of every member, in the order the repository returned them.
    #[must_use]
    pub fn member_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.user_id).collect()
    }
}

/// A chat as shown in a chat list: the chat plus its newest message, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichChat {
    pub chat_id: Uuid,
    pub is_direct: bool,
    pub last_message: Option<Message>,
}

/// Request to create a chat with an initial member set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub chat_id: Uuid,
    pub is_direct: bool,
    pub members: Vec<Uuid>,
}

impl NewChat {
    /// Returns the member set with duplicates removed and `creator` present,
    /// preserving the order in which members were first listed.
    #[must_use]
    pub fn members_with(&self, creator: Uuid) -> Vec<Uuid> {
        let mut members = Vec::with_capacity(self.members.len() + 1);
        for user_id in &self.members {
            if !members.contains(user_id) {
                members.push(*user_id);
            }
        }
        if !members.contains(&creator) {
            members.push(creator);
        }
        members
    }
}
