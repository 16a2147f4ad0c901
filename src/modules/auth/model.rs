use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::modules::users::model::User;

// JWT claims carried by every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize,
    pub iat: usize,
    /// owning user id
    pub sub: String,
    /// owning user login
    pub lgn: String,
}

/// A persisted token record.
///
/// The record is the source of truth for revocation: deleting it
/// invalidates the token even while the signature is still good.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AccessToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.expires <= Utc::now()
    }
}

/// Token validation failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The signature's `exp` claim has passed.
    #[error("token is expired")]
    Expired,
    /// Missing or duplicated record, bad signature, malformed claims, or a
    /// failed re-authentication.
    #[error("token is invalid")]
    Invalid,
    /// The directory or token store itself failed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "login cannot be empty"))]
    pub login: String,
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
}

/// Login success payload: the authenticated user plus a fresh token.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}
