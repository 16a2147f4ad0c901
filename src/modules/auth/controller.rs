use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde_json::json;
use tracing::instrument;
use utoipa::ToSchema;

use crate::middleware::context::{ScratchData, parse_bearer};
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::response::{ApiResponse, Protocol};
use crate::validator::ValidatedJson;

use super::model::LoginRequest;

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Demo endpoint behind the `api_key` middleware; echoes the key info the
/// middleware left in scratch.
#[utoipa::path(
    get,
    path = "/api/http/hello",
    responses(
        (status = 200, description = "Greeting with key info from the api_key middleware"),
        (status = 400, description = "Missing or invalid X-Api-Key header")
    ),
    tag = "Auth"
)]
pub async fn hello(proto: Protocol, scratch: Option<Extension<ScratchData>>) -> ApiResponse {
    let key_info = scratch
        .as_ref()
        .and_then(|Extension(s)| s.get("key_info").cloned());

    proto.respond(
        json!({ "message": "hello!", "key_info": key_info }),
        StatusCode::OK,
    )
}

/// Login with credentials and receive a fresh token.
#[utoipa::path(
    post,
    path = "/api/http/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = super::model::AuthSession),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Token could not be issued", body = ErrorResponse)
    ),
    tag = "Auth"
)]
#[instrument(skip(state, dto))]
pub async fn login(
    proto: Protocol,
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse, AppError> {
    match state.auth.login(&dto.login, &dto.password).await? {
        Some(session) => Ok(proto.respond(
            json!({ "user": session.user, "token": session.token }),
            StatusCode::OK,
        )),
        None => Ok(proto.respond(
            json!({ "message": "Invalid login or password" }),
            StatusCode::UNAUTHORIZED,
        )),
    }
}

/// The authenticated user's record. Requires the `jwt` middleware, which
/// leaves the caller's identity in scratch.
#[utoipa::path(
    get,
    path = "/api/http/me",
    responses(
        (status = 200, description = "The authenticated user", body = crate::modules::users::model::User),
        (status = 401, description = "Missing, invalid or expired token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    proto: Protocol,
    State(state): State<AppState>,
    scratch: Option<Extension<ScratchData>>,
) -> Result<ApiResponse, AppError> {
    let user_id = scratch
        .as_ref()
        .and_then(|Extension(s)| s.get("auth_user"))
        .and_then(|u| u.get("uid"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<uuid::Uuid>().ok())
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;

    let user = state
        .users
        .lookup(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

    Ok(proto.respond(serde_json::to_value(&user)?, StatusCode::OK))
}

/// Revokes the presented token. Best-effort: always replies with an empty
/// success.
#[utoipa::path(
    post,
    path = "/api/http/logout",
    responses(
        (status = 200, description = "Token revoked"),
        (status = 401, description = "Missing, invalid or expired token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    proto: Protocol,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(parse_bearer)
        .unwrap_or_default();

    state.auth.logout(&token).await;

    proto.respond(json!({}), StatusCode::OK)
}
