use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User is not authorized to this action: authentication required")]
    AuthenticationRequired,
    #[error("User is not authorized to this action: user is not a chat member")]
    UserIsNotAChatMember,
    #[error("Chat with provided chat_id already exists")]
    ChatAlreadyExists,
    #[error("Chat with provided chat_id does not exist")]
    ChatNotFound,
    #[error("Message with provided message_id already exists")]
    MessageAlreadyExists,
    #[error("Message does not exist")]
    MessageNotFound,
    #[error("Message replies to a message that does not exist")]
    RepliedMessageNotFound,
    #[error("Members list can't be empty")]
    EmptyMembers,
    #[error("Business logic violation: {0}")]
    BusinessLogicViolation(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Broker error: {0}")]
    Broker(#[source] anyhow::Error),
    #[error("Operation deadline exceeded")]
    Timeout,
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for the specializations of "permission denied".
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::AuthenticationRequired | Self::UserIsNotAChatMember)
    }

    /// True for failures of the store, the broker or the deadline, as opposed to domain outcomes.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Broker(_) | Self::Timeout | Self::Internal)
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::UserIsNotAChatMember => StatusCode::FORBIDDEN,
            Self::ChatAlreadyExists | Self::MessageAlreadyExists => StatusCode::CONFLICT,
            Self::ChatNotFound | Self::MessageNotFound | Self::RepliedMessageNotFound => StatusCode::NOT_FOUND,
            Self::EmptyMembers | Self::BusinessLogicViolation(_) | Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Broker(_) | Self::Timeout | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_infrastructure() {
            tracing::error!(error = %self, "Request failed on infrastructure error");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = %status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
