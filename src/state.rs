use std::sync::Arc;

use crate::config::api::ApiConfig;
use crate::config::cors::CorsConfig;
use crate::config::database::init_db_pool;
use crate::config::jwt::JwtConfig;
use crate::middleware::handlers::init_registry;
use crate::middleware::registry::MiddlewareRegistry;
use crate::modules::auth::service::AuthService;
use crate::modules::auth::store::{PgTokenStore, TokenStore};
use crate::modules::users::directory::{PgUserDirectory, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub tokens: Arc<dyn TokenStore>,
    pub auth: Arc<AuthService>,
    pub registry: Arc<MiddlewareRegistry>,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
}

/// Wires the state from collaborator implementations. Production uses the
/// Postgres collaborators; tests pass in-memory ones.
pub fn build_app_state(
    users: Arc<dyn UserDirectory>,
    tokens: Arc<dyn TokenStore>,
    jwt_config: JwtConfig,
    api_config: ApiConfig,
    cors_config: CorsConfig,
) -> AppState {
    let auth = Arc::new(AuthService::new(
        users.clone(),
        tokens.clone(),
        jwt_config.clone(),
    ));
    let registry = Arc::new(init_registry(&auth, &users, &api_config));

    AppState {
        users,
        tokens,
        auth,
        registry,
        jwt_config,
        cors_config,
    }
}

pub async fn init_app_state() -> AppState {
    let pool = init_db_pool().await;
    let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
    let tokens: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool));

    build_app_state(
        users,
        tokens,
        JwtConfig::from_env(),
        ApiConfig::from_env(),
        CorsConfig::from_env(),
    )
}
