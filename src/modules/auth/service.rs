use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::config::jwt::JwtConfig;
use crate::modules::users::directory::UserDirectory;
use crate::modules::users::model::User;
use crate::utils::errors::AppError;
use crate::utils::jwt::{decode_token, sign_token};

use super::model::{AuthError, AuthSession, Claims};
use super::store::TokenStore;

/// Login, logout and the stateful token lifecycle.
///
/// Every issued token passes two independent gates when validated: the
/// persisted record (revocable at any time) and the cryptographic
/// signature (expires with the embedded `exp` claim). Deleting the record
/// invalidates a token immediately even though its signature stays good
/// until expiry.
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<dyn TokenStore>,
    jwt_config: JwtConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tokens: Arc<dyn TokenStore>,
        jwt_config: JwtConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            jwt_config,
        }
    }

    /// Issues a signed token for `user` and persists its record with the
    /// same expiry. There is no partial success: a signing or persistence
    /// failure fails the whole operation.
    #[instrument(skip(self))]
    pub async fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires = now + Duration::days(self.jwt_config.token_expiry_days);

        let claims = Claims {
            exp: expires.timestamp() as usize,
            iat: now.timestamp() as usize,
            sub: user.id.to_string(),
            lgn: user.login.clone(),
        };

        let token = sign_token(&claims, &self.jwt_config)?;

        if let Err(e) = self.tokens.persist(&token, user.id, expires).await {
            error!(user_id = %user.id, error = %e, "failed to persist access token");
            return Err(AppError::internal(e));
        }

        Ok(token)
    }

    /// Checks credentials without issuing a token. `None` means they were
    /// rejected.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.authenticate(login, password).await?)
    }

    /// Credential check plus token issuance. `None` on bad credentials;
    /// a token creation failure propagates.
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<Option<AuthSession>, AppError> {
        let Some(user) = self.users.authenticate(login, password).await? else {
            return Ok(None);
        };

        let token = self.create_token(&user).await?;
        Ok(Some(AuthSession { user, token }))
    }

    /// Best-effort logout: deletes the persisted record when a token is
    /// supplied. Never fails the request.
    pub async fn logout(&self, token: &str) {
        if token.is_empty() {
            return;
        }
        if let Err(e) = self.tokens.delete(token).await {
            debug!(error = %e, "logout could not delete token record");
        }
    }

    /// The database-backed gate: the owning user id iff exactly one
    /// matching, non-expired record exists. Duplicate records are treated
    /// as invalid, not as an error.
    pub async fn verify(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        let records = self.tokens.find(token).await?;
        match records.as_slice() {
            [record] if !record.is_expired() => Ok(Some(record.user_id)),
            _ => Ok(None),
        }
    }

    /// Validates a token through both gates: the persisted record first,
    /// then the signature. With `authenticate`, additionally replays the
    /// token as a credential against the user directory; a rejection there
    /// invalidates the token even when the decode succeeded.
    pub async fn validate_token(&self, token: &str, authenticate: bool) -> Result<Claims, AuthError> {
        let verified = self
            .verify(token)
            .await
            .map_err(|e| AuthError::Backend(e.error))?;
        if verified.is_none() {
            return Err(AuthError::Invalid);
        }

        let claims = decode_token(token, &self.jwt_config)?;

        if authenticate {
            let user = self
                .users
                .authenticate(&claims.lgn, token)
                .await
                .map_err(AuthError::Backend)?;
            if user.is_none() {
                return Err(AuthError::Invalid);
            }
        }

        Ok(claims)
    }
}
