use crate::api::AppState;
use crate::domain::caller::{Caller, Claims};
use crate::error::AppError;
use axum::{
    extract::{FromRequest, FromRequestParts, Json, Path, Query, Request},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;

/// Caller identity from an optional `Authorization: Bearer` header.
///
/// A request without the header is anonymous; a present but invalid token is rejected.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Caller>);

impl MaybeCaller {
    #[must_use]
    pub const fn get(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let auth_str = auth_header.to_str().map_err(|_| AppError::AuthenticationRequired)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthenticationRequired)?;

        let claims = Claims::decode(token, &state.config.auth.jwt_secret)?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        Ok(Self(Some(Caller::from(claims))))
    }
}

/// `Path` whose rejection is an `AppError::InvalidArgument` JSON response.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection is an `AppError::InvalidArgument` JSON response.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Json` body whose rejection is an `AppError::InvalidArgument` JSON response.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;
        Ok(Self(value))
    }
}
