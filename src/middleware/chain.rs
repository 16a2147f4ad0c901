use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::warn;

use crate::utils::response::ApiResponse;

use super::context::RequestContext;
use super::error::MiddlewareError;
use super::registry::{Middleware, MiddlewareRef, MiddlewareRegistry};

/// The dispatch engine.
///
/// Handlers execute strictly in list order; the first failure wins and
/// nothing after it runs. A failure never escapes the chain unformatted:
/// it always comes back as a response shaped for the request's protocol.
pub struct MiddlewareChain {
    registry: Arc<MiddlewareRegistry>,
}

impl MiddlewareChain {
    pub fn new(registry: Arc<MiddlewareRegistry>) -> Self {
        Self { registry }
    }

    /// Runs the innate prefix, then `refs`. `None` means every handler
    /// passed and the caller may invoke the route handler.
    pub async fn run(
        &self,
        ctx: &mut RequestContext,
        refs: &[MiddlewareRef],
    ) -> Option<ApiResponse> {
        if let Some(failure) = self.run_list(ctx, self.registry.innate()).await {
            return Some(failure);
        }
        self.run_list(ctx, refs).await
    }

    /// Same algorithm without the innate prefix.
    pub async fn run_pure(
        &self,
        ctx: &mut RequestContext,
        refs: &[MiddlewareRef],
    ) -> Option<ApiResponse> {
        self.run_list(ctx, refs).await
    }

    async fn run_list(
        &self,
        ctx: &mut RequestContext,
        refs: &[MiddlewareRef],
    ) -> Option<ApiResponse> {
        for reference in refs {
            let Some((handler, param)) = self.registry.resolve(reference) else {
                // reported at bind time; a deployment profile may leave an
                // alias unregistered on purpose
                warn!(
                    alias = reference.label(),
                    "skipping unresolved middleware reference"
                );
                continue;
            };

            if let Some(failure) =
                invoke(ctx, handler.as_ref(), param.as_ref(), reference.label()).await
            {
                return Some(failure);
            }
        }
        None
    }
}

/// Runs one handler and translates a failure into a shaped response.
async fn invoke(
    ctx: &mut RequestContext,
    handler: &dyn Middleware,
    param: Option<&Value>,
    label: &str,
) -> Option<ApiResponse> {
    let proto = ctx.protocol();

    match handler.call(ctx, param).await {
        Ok(()) => None,
        Err(MiddlewareError::Rejection(rejection)) => {
            warn!(
                middleware = label,
                status = rejection.status.as_u16(),
                "{}",
                rejection.message
            );
            Some(proto.respond(rejection.body(), rejection.status))
        }
        Err(MiddlewareError::Response(response)) => {
            warn!(
                middleware = label,
                status = response.status.as_u16(),
                "middleware returned a custom response"
            );
            Some(response)
        }
        Err(MiddlewareError::Unexpected(error)) => {
            warn!(middleware = label, error = %error, "middleware failed");
            Some(proto.respond(json!({}), StatusCode::BAD_REQUEST))
        }
    }
}
