//! The token codec: pure signing and decoding of JWT payloads.
//!
//! Signing uses HMAC-SHA256 with the process-wide secret from
//! [`JwtConfig`]. Decoding verifies the signature and the standard
//! time-based claims, distinguishing an expired signature from any other
//! defect. Whether a token is *accepted* additionally depends on its
//! persisted record; see [`crate::modules::auth::service::AuthService`].

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};

use crate::config::jwt::JwtConfig;
use crate::modules::auth::model::{AuthError, Claims};
use crate::utils::errors::AppError;

pub fn sign_token(claims: &Claims, jwt_config: &JwtConfig) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid,
    })
}
