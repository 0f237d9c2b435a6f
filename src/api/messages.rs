use crate::api::AppState;
use crate::api::middleware::{ApiJson, ApiPath, ApiQuery, MaybeCaller};
use crate::api::schemas::messages::{MessageQuery, MessageResponse, SendMessage};
use crate::error::Result;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Sends a message to a chat the caller belongs to.
///
/// # Errors
/// Returns `AppError::InvalidArgument` if the message has no content.
/// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
/// Returns `AppError::MessageAlreadyExists` if the message id is taken.
pub async fn send_message(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SendMessage>,
) -> Result<impl IntoResponse> {
    let outgoing = payload.into_outgoing(chat_id)?;
    let message = state.chat_service.send_message(caller.get(), outgoing).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Returns a page of chat history, oldest first.
///
/// # Errors
/// Returns `AppError::InvalidArgument` if `count` is out of range.
/// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
pub async fn get_messages(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> Result<Json<Vec<MessageResponse>>> {
    let selector = query.into_selector(chat_id, state.config.messaging.max_page_size)?;
    let messages = state.chat_service.get_messages(caller.get(), selector).await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
