use crate::error::{AppError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, ttl_secs: u64) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        Self { sub: user_id, exp: now + ttl_secs }
    }

    /// Signs the claims with an HS256 shared secret.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the token cannot be encoded.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes())).map_err(|_| AppError::Internal)
    }

    /// Verifies the signature and expiry of `token`.
    ///
    /// # Errors
    /// Returns `AppError::AuthenticationRequired` if the token is invalid or expired.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let data = decode::<Self>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::AuthenticationRequired
            })?;
        Ok(data.claims)
    }
}

/// The authenticated identity attached to an inbound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub claims: Claims,
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self { user_id: claims.sub, claims }
    }
}
