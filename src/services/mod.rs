pub mod chat_service;
pub mod health_service;
pub mod registry;
pub mod update_publisher;
