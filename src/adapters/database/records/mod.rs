pub mod chat;
pub mod message;

pub use chat::{ChatRecord, RichChatRecord};
pub use message::{AttachmentRecord, MessageRecord};
