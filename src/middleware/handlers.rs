//! The built-in middleware handlers and their startup registration.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::config::api::ApiConfig;
use crate::modules::auth::model::AuthError;
use crate::modules::auth::service::AuthService;
use crate::modules::users::directory::UserDirectory;

use super::context::RequestContext;
use super::error::{MiddlewareError, Rejection};
use super::registry::{Middleware, MiddlewareFuture, MiddlewareRegistry};

/// Validates the context's bearer token and records the authenticated user
/// in scratch under `auth_user`. An expired signature is reported as such;
/// every other failure collapses to "invalid" so nothing leaks about why.
async fn authenticate_request(
    auth: &AuthService,
    ctx: &mut RequestContext,
) -> Result<(), MiddlewareError> {
    match auth.validate_token(&ctx.bearer_token, true).await {
        Ok(claims) => {
            ctx.scratch
                .set("auth_user", json!({ "uid": claims.sub, "login": claims.lgn }));
            Ok(())
        }
        Err(AuthError::Expired) => Err(Rejection::new(
            "Token expired",
            StatusCode::UNAUTHORIZED,
            "token_expired",
        )
        .into()),
        Err(_) => Err(Rejection::new(
            "Invalid token",
            StatusCode::UNAUTHORIZED,
            "invalid_token",
        )
        .into()),
    }
}

/// Bearer-token authentication, registered as `jwt`.
pub struct JwtAuth {
    auth: Arc<AuthService>,
}

impl JwtAuth {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}

impl Middleware for JwtAuth {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move { authenticate_request(&self.auth, ctx).await }.boxed()
    }
}

/// Shared-key check on the `X-Api-Key` header, registered as `api_key`.
pub struct ApiKey {
    expected: String,
}

impl ApiKey {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Middleware for ApiKey {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            if ctx.header("X-Api-Key") != Some(self.expected.as_str()) {
                return Err(Rejection::new(
                    "Invalid Api Key",
                    StatusCode::BAD_REQUEST,
                    "invalid_api_key",
                )
                .into());
            }
            ctx.scratch.set("key_info", json!({ "client": "api-key" }));
            Ok(())
        }
        .boxed()
    }
}

/// Group-membership authorization, registered as `group`.
///
/// Authenticates like [`JwtAuth`], then passes iff the user belongs to any
/// of the groups named by the route's parameter. No parameter means no
/// possible match: fails closed.
pub struct RequireGroup {
    auth: Arc<AuthService>,
    users: Arc<dyn UserDirectory>,
}

impl RequireGroup {
    pub fn new(auth: Arc<AuthService>, users: Arc<dyn UserDirectory>) -> Self {
        Self { auth, users }
    }
}

impl Middleware for RequireGroup {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            authenticate_request(&self.auth, ctx).await?;

            let user_id = ctx
                .scratch
                .get("auth_user")
                .and_then(|u| u.get("uid"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Uuid>().ok())
                .ok_or_else(|| {
                    MiddlewareError::Unexpected(anyhow::anyhow!("auth_user missing from scratch"))
                })?;

            let groups: Vec<String> = param
                .map(|p| serde_json::from_value(p.clone()))
                .transpose()
                .map_err(|e| MiddlewareError::Unexpected(e.into()))?
                .unwrap_or_default();

            for group in &groups {
                if self
                    .users
                    .user_in_group(user_id, group)
                    .await
                    .map_err(MiddlewareError::Unexpected)?
                {
                    return Ok(());
                }
            }

            Err(Rejection::new(
                "Insufficient privilege",
                StatusCode::FORBIDDEN,
                "no_privilege",
            )
            .into())
        }
        .boxed()
    }
}

/// Innate request logging, registered as `logger`: one line when the chain
/// starts, one through an end hook once the final response is known.
pub struct Logger;

impl Middleware for Logger {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            let started = Instant::now();
            info!(method = %ctx.method, path = %ctx.path, "request started");

            ctx.on_end(move |ctx, response| {
                info!(
                    method = %ctx.method,
                    path = %ctx.path,
                    status = response.status().as_u16(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "request completed"
                );
            });
            Ok(())
        }
        .boxed()
    }
}

/// Builds the process-wide registry. Called once at startup; the result is
/// shared immutably behind an `Arc`.
pub fn init_registry(
    auth: &Arc<AuthService>,
    users: &Arc<dyn UserDirectory>,
    api_config: &ApiConfig,
) -> MiddlewareRegistry {
    let mut registry = MiddlewareRegistry::new();

    registry.register("api_key", ApiKey::new(api_config.api_key.clone()));
    registry.register("jwt", JwtAuth::new(auth.clone()));
    registry.register("group", RequireGroup::new(auth.clone(), users.clone()));
    registry.register("logger", Logger);

    registry.always("logger");

    registry
}
