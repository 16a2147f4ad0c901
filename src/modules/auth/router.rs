use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::routing::{get, post};

use crate::middleware::pipeline::{bind_refs, dispatch};
use crate::state::AppState;

use super::controller::{hello, login, logout, me};

/// One route group, mounted at both `/api/http` and `/api/rpc`; protocol
/// selection is by content type, not path.
///
/// Each sub-router gets its own chain: `hello` requires the shared API
/// key, `me`/`logout` require a live token, and `login` runs only the
/// innate handlers.
pub fn init_auth_router(state: AppState) -> Router<AppState> {
    let with_api_key = bind_refs(&state, ["api_key"]);
    let with_jwt = bind_refs(&state, ["jwt"]);
    let public = bind_refs(&state, Vec::<&str>::new());

    Router::new()
        .merge(
            Router::new().route("/hello", get(hello)).route_layer(
                middleware::from_fn_with_state(
                    state.clone(),
                    move |state: State<AppState>, req: Request, next: Next| {
                        dispatch(state, req, next, with_api_key.clone(), true)
                    },
                ),
            ),
        )
        .merge(
            Router::new().route("/login", post(login)).route_layer(
                middleware::from_fn_with_state(
                    state.clone(),
                    move |state: State<AppState>, req: Request, next: Next| {
                        dispatch(state, req, next, public.clone(), true)
                    },
                ),
            ),
        )
        .merge(
            Router::new()
                .route("/me", get(me))
                .route("/logout", post(logout))
                .route_layer(middleware::from_fn_with_state(
                    state,
                    move |state: State<AppState>, req: Request, next: Next| {
                        dispatch(state, req, next, with_jwt.clone(), true)
                    },
                )),
        )
}
