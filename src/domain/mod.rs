pub mod caller;
pub mod chat;
pub mod message;
pub mod update;
