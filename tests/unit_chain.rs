mod common;

use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::FutureExt;
use serde_json::{Value, json};

use tokengate::middleware::chain::MiddlewareChain;
use tokengate::middleware::context::RequestContext;
use tokengate::middleware::error::{MiddlewareError, Rejection};
use tokengate::middleware::registry::{
    Middleware, MiddlewareFuture, MiddlewareRef, MiddlewareRegistry,
};
use tokengate::utils::response::ApiResponse;

type RunLog = Arc<Mutex<Vec<String>>>;

/// Records that it ran, then continues the chain.
struct Recorder {
    name: &'static str,
    log: RunLog,
}

impl Middleware for Recorder {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            self.log.lock().unwrap().push(self.name.to_string());
            Ok(())
        }
        .boxed()
    }
}

/// Records that it ran, then aborts the chain with the given error.
struct FailWith {
    name: &'static str,
    log: RunLog,
    error: fn() -> MiddlewareError,
}

impl Middleware for FailWith {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            self.log.lock().unwrap().push(self.name.to_string());
            Err((self.error)())
        }
        .boxed()
    }
}

/// Stores a value in scratch for later handlers.
struct SetScratch;

impl Middleware for SetScratch {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            ctx.scratch.set("key_info", json!({ "client": "test" }));
            Ok(())
        }
        .boxed()
    }
}

/// Fails unless an earlier handler left `key` in scratch.
struct RequireScratchKey {
    key: &'static str,
}

impl Middleware for RequireScratchKey {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            if ctx.scratch.get(self.key).is_none() {
                return Err(Rejection::bad_request(format!("{} missing", self.key)).into());
            }
            Ok(())
        }
        .boxed()
    }
}

/// Captures the parameter it was invoked with.
struct CaptureParam {
    seen: Arc<Mutex<Option<Value>>>,
}

impl Middleware for CaptureParam {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut RequestContext,
        param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            *self.seen.lock().unwrap() = param.cloned();
            Ok(())
        }
        .boxed()
    }
}

/// Registers an end hook recording the final response's status.
struct HookRegister {
    log: RunLog,
}

impl Middleware for HookRegister {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        async move {
            self.log.lock().unwrap().push("hook".to_string());
            let log = self.log.clone();
            ctx.on_end(move |_ctx, response| {
                log.lock()
                    .unwrap()
                    .push(format!("end:{}", response.status().as_u16()));
            });
            Ok(())
        }
        .boxed()
    }
}

fn reject_401() -> MiddlewareError {
    Rejection::new("nope", StatusCode::UNAUTHORIZED, "denied").into()
}

#[tokio::test]
async fn test_first_failure_wins_and_later_handlers_never_run() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "a",
        Recorder {
            name: "a",
            log: log.clone(),
        },
    );
    registry.register(
        "boom",
        FailWith {
            name: "boom",
            log: log.clone(),
            error: reject_401,
        },
    );
    registry.register(
        "b",
        Recorder {
            name: "b",
            log: log.clone(),
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain
        .run_pure(&mut ctx, &["a".into(), "boom".into(), "b".into()])
        .await
        .expect("chain reports the failure");

    assert_eq!(failure.status, StatusCode::UNAUTHORIZED);
    assert_eq!(failure.body["message"], "nope");
    assert_eq!(failure.body["type"], "denied");
    assert_eq!(failure.body["code"], 401);
    assert_eq!(*log.lock().unwrap(), vec!["a", "boom"]);
}

#[tokio::test]
async fn test_innate_prefix_runs_before_route_list() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "route",
        Recorder {
            name: "route",
            log: log.clone(),
        },
    );
    registry.always(MiddlewareRef::direct(Recorder {
        name: "innate",
        log: log.clone(),
    }));

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    assert!(chain.run(&mut ctx, &["route".into()]).await.is_none());
    assert_eq!(*log.lock().unwrap(), vec!["innate", "route"]);
}

#[tokio::test]
async fn test_innate_failure_blocks_route_list() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "route",
        Recorder {
            name: "route",
            log: log.clone(),
        },
    );
    registry.always(MiddlewareRef::direct(FailWith {
        name: "innate-boom",
        log: log.clone(),
        error: reject_401,
    }));

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain.run(&mut ctx, &["route".into()]).await;
    assert!(failure.is_some());
    assert_eq!(*log.lock().unwrap(), vec!["innate-boom"]);
}

#[tokio::test]
async fn test_pure_variant_skips_innate() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "route",
        Recorder {
            name: "route",
            log: log.clone(),
        },
    );
    registry.always(MiddlewareRef::direct(Recorder {
        name: "innate",
        log: log.clone(),
    }));

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    assert!(chain.run_pure(&mut ctx, &["route".into()]).await.is_none());
    assert_eq!(*log.lock().unwrap(), vec!["route"]);
}

#[tokio::test]
async fn test_unresolved_alias_is_skipped() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "real",
        Recorder {
            name: "real",
            log: log.clone(),
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain
        .run_pure(&mut ctx, &["ghost".into(), "real".into()])
        .await;

    assert!(failure.is_none());
    assert_eq!(*log.lock().unwrap(), vec!["real"]);
}

#[tokio::test]
async fn test_scratch_is_shared_across_handlers() {
    let mut registry = MiddlewareRegistry::new();
    registry.register("set", SetScratch);
    registry.register("need", RequireScratchKey { key: "key_info" });

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain
        .run_pure(&mut ctx, &["set".into(), "need".into()])
        .await;

    assert!(failure.is_none());
    assert_eq!(ctx.scratch.get("key_info").unwrap()["client"], "test");
}

#[tokio::test]
async fn test_parameter_reaches_aliased_handler() {
    let seen = Arc::new(Mutex::new(None));
    let mut registry = MiddlewareRegistry::new();
    registry.register("cap", CaptureParam { seen: seen.clone() });

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let refs = [("cap", json!(["g1", "g2"])).into()];
    assert!(chain.run_pure(&mut ctx, &refs).await.is_none());
    assert_eq!(*seen.lock().unwrap(), Some(json!(["g1", "g2"])));

    // a bare alias invokes the same handler with no parameter
    let refs = [MiddlewareRef::from("cap")];
    assert!(chain.run_pure(&mut ctx, &refs).await.is_none());
    assert_eq!(*seen.lock().unwrap(), None);
}

#[tokio::test]
async fn test_unexpected_error_becomes_generic_400() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "boom",
        FailWith {
            name: "boom",
            log: log.clone(),
            error: || anyhow::anyhow!("db exploded").into(),
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));

    let mut ctx = RequestContext::new();
    let failure = chain.run_pure(&mut ctx, &["boom".into()]).await.unwrap();
    assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    assert_eq!(failure.body, json!({}));

    // same failure under the rpc protocol is wrapped in the envelope
    let mut ctx = RequestContext::new();
    ctx.rpc = true;
    let failure = chain.run_pure(&mut ctx, &["boom".into()]).await.unwrap();
    assert_eq!(failure.status, StatusCode::OK);
    assert_eq!(failure.body["success"], false);
    assert_eq!(failure.body["code"], 400);
}

#[tokio::test]
async fn test_custom_response_takes_precedence() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "boom",
        FailWith {
            name: "boom",
            log: log.clone(),
            error: || {
                ApiResponse {
                    status: StatusCode::IM_A_TEAPOT,
                    body: json!({ "custom": true }),
                }
                .into()
            },
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain.run_pure(&mut ctx, &["boom".into()]).await.unwrap();
    assert_eq!(failure.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(failure.body["custom"], true);
}

#[tokio::test]
async fn test_end_hook_fires_exactly_once_with_failure_response() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register("hook", HookRegister { log: log.clone() });
    registry.register(
        "boom",
        FailWith {
            name: "boom",
            log: log.clone(),
            error: reject_401,
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    let failure = chain
        .run_pure(&mut ctx, &["hook".into(), "boom".into()])
        .await
        .expect("second handler fails");

    let response = failure.into_response();
    ctx.finish(&response);
    // a second finish must not refire the hooks
    ctx.finish(&response);

    assert_eq!(*log.lock().unwrap(), vec!["hook", "boom", "end:401"]);
}

#[tokio::test]
async fn test_re_registration_last_write_wins() {
    let log: RunLog = Default::default();
    let mut registry = MiddlewareRegistry::new();
    registry.register(
        "dup",
        Recorder {
            name: "first",
            log: log.clone(),
        },
    );
    registry.register(
        "dup",
        Recorder {
            name: "second",
            log: log.clone(),
        },
    );

    let chain = MiddlewareChain::new(Arc::new(registry));
    let mut ctx = RequestContext::new();

    assert!(chain.run_pure(&mut ctx, &["dup".into()]).await.is_none());
    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn test_group_middleware_fails_closed_then_passes_with_membership() {
    let backend = common::setup_backend();
    let user = backend.directory.add_user("grouped@example.com", "pw123");
    let token = backend.state.auth.create_token(&user).await.unwrap();

    let chain = MiddlewareChain::new(backend.state.registry.clone());
    let refs = [("group", json!(["admins"])).into()];

    let mut ctx = RequestContext::new();
    ctx.bearer_token = token.clone();
    let failure = chain
        .run_pure(&mut ctx, &refs)
        .await
        .expect("user is not in the group yet");
    assert_eq!(failure.status, StatusCode::FORBIDDEN);
    assert_eq!(failure.body["type"], "no_privilege");

    backend.directory.add_to_group(user.id, "admins");

    let mut ctx = RequestContext::new();
    ctx.bearer_token = token;
    assert!(chain.run_pure(&mut ctx, &refs).await.is_none());
}

#[tokio::test]
async fn test_group_middleware_without_parameter_fails_closed() {
    let backend = common::setup_backend();
    let user = backend.directory.add_user("nogroups@example.com", "pw123");
    backend.directory.add_to_group(user.id, "admins");
    let token = backend.state.auth.create_token(&user).await.unwrap();

    let chain = MiddlewareChain::new(backend.state.registry.clone());

    let mut ctx = RequestContext::new();
    ctx.bearer_token = token;
    let failure = chain
        .run_pure(&mut ctx, &["group".into()])
        .await
        .expect("no groups requested means no possible match");
    assert_eq!(failure.status, StatusCode::FORBIDDEN);
}
