//! Axum integration for the middleware chain.
//!
//! A route opts in with a `from_fn_with_state` closure over [`dispatch`],
//! which buffers the body, builds the [`RequestContext`], runs the chain,
//! and short-circuits with the formatted failure. When every handler
//! passes, the scratch map is exposed to the route handler as a request
//! extension and the end hooks fire with the final response.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::warn;

use crate::state::AppState;

use super::chain::MiddlewareChain;
use super::context::RequestContext;
use super::registry::MiddlewareRef;

/// Builds the reference list for a route, reporting unknown aliases at
/// bind time. They are still skipped at run time, since a deployment
/// profile may leave an alias unregistered on purpose, but a typo'd alias
/// shows up in the logs the moment the router is built rather than when a
/// request silently sails past a disabled check.
pub fn bind_refs(
    state: &AppState,
    refs: impl IntoIterator<Item = impl Into<MiddlewareRef>>,
) -> Arc<Vec<MiddlewareRef>> {
    let refs: Vec<MiddlewareRef> = refs.into_iter().map(Into::into).collect();

    let unknown = state.registry.unresolved(&refs);
    if !unknown.is_empty() {
        warn!(
            aliases = ?unknown,
            "route references unregistered middleware aliases"
        );
    }

    Arc::new(refs)
}

/// Runs the middleware chain ahead of the route handler.
pub async fn dispatch(
    State(state): State<AppState>,
    req: Request,
    next: Next,
    refs: Arc<Vec<MiddlewareRef>>,
    with_innate: bool,
) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to buffer request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let mut ctx = RequestContext::from_parts(&parts, &bytes);
    let chain = MiddlewareChain::new(state.registry.clone());

    let failure = if with_innate {
        chain.run(&mut ctx, refs.as_slice()).await
    } else {
        chain.run_pure(&mut ctx, refs.as_slice()).await
    };

    if let Some(failure) = failure {
        let response = failure.into_response();
        ctx.finish(&response);
        return response;
    }

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(ctx.scratch.clone());

    let response = next.run(req).await;
    ctx.finish(&response);
    response
}
