use crate::api::AppState;
use crate::api::middleware::{ApiJson, ApiPath, MaybeCaller};
use crate::api::schemas::chats::{ChatResponse, ChatSummary, CreateChat, MemberList};
use crate::error::Result;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Creates a chat; the caller always becomes a member.
///
/// # Errors
/// Returns `AppError::InvalidArgument` if the request is malformed.
/// Returns `AppError::ChatAlreadyExists` if the chat id is taken.
pub async fn create_chat(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateChat>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.chat_service.create_chat(caller.get(), payload.into()).await?;

    Ok(StatusCode::CREATED)
}

/// Lists the caller's chats, most recently active first.
///
/// # Errors
/// Returns `AppError::AuthenticationRequired` for anonymous callers.
pub async fn list_chats(caller: MaybeCaller, State(state): State<AppState>) -> Result<Json<Vec<ChatSummary>>> {
    let chats = state.chat_service.get_users_chats(caller.get()).await?;

    Ok(Json(chats.into_iter().map(Into::into).collect()))
}

/// # Errors
/// Returns `AppError::ChatNotFound` or `AppError::UserIsNotAChatMember`.
pub async fn get_chat(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
) -> Result<Json<ChatResponse>> {
    let chat = state.chat_service.get_chat_with_members(caller.get(), chat_id).await?;

    Ok(Json(chat.into()))
}

/// # Errors
/// Returns `AppError::InvalidArgument` if no users are listed.
/// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
pub async fn add_members(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<MemberList>,
) -> Result<impl IntoResponse> {
    let user_ids = payload.into_user_ids()?;
    state.chat_service.add_chat_members(caller.get(), chat_id, user_ids).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// # Errors
/// Returns `AppError::InvalidArgument` if no users are listed.
/// Returns `AppError::UserIsNotAChatMember` if the caller is not a member.
pub async fn remove_members(
    caller: MaybeCaller,
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<MemberList>,
) -> Result<impl IntoResponse> {
    let user_ids = payload.into_user_ids()?;
    state.chat_service.delete_chat_members(caller.get(), chat_id, user_ids).await?;

    Ok(StatusCode::NO_CONTENT)
}
