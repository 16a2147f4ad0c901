#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tokengate::config::api::ApiConfig;
use tokengate::config::cors::CorsConfig;
use tokengate::config::jwt::JwtConfig;
use tokengate::modules::auth::model::AccessToken;
use tokengate::modules::auth::store::TokenStore;
use tokengate::modules::users::directory::UserDirectory;
use tokengate::modules::users::model::User;
use tokengate::state::{AppState, build_app_state};
use tokengate::utils::password::{hash_password, verify_password};

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test_secret_key_for_testing_purposes".to_string(),
        token_expiry_days: 30,
    }
}

/// In-memory token store. Deliberately allows duplicate records so tests
/// can reproduce persistence anomalies.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: Mutex<Vec<AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inserts a record directly, bypassing the uniqueness a real store
    /// would enforce.
    pub fn insert_raw(&self, record: AccessToken) {
        self.records.lock().unwrap().push(record);
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn persist(
        &self,
        token: &str,
        user_id: Uuid,
        expires: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(AccessToken {
            token: token.to_string(),
            user_id,
            expires,
        });
        Ok(())
    }

    async fn find(&self, token: &str) -> anyhow::Result<Vec<AccessToken>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.token == token)
            .cloned()
            .collect())
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        self.records.lock().unwrap().retain(|r| r.token != token);
        Ok(())
    }
}

/// Store whose every operation fails, for fatal-path tests.
pub struct FailingTokenStore;

#[async_trait]
impl TokenStore for FailingTokenStore {
    async fn persist(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("token store unavailable"))
    }

    async fn find(&self, _: &str) -> anyhow::Result<Vec<AccessToken>> {
        Err(anyhow::anyhow!("token store unavailable"))
    }

    async fn delete(&self, _: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("token store unavailable"))
    }
}

/// In-memory user directory with the same token-as-credential fallback
/// the Postgres implementation has.
pub struct MemoryDirectory {
    users: Mutex<Vec<(User, String)>>,
    groups: Mutex<HashMap<Uuid, Vec<String>>>,
    tokens: Arc<MemoryTokenStore>,
}

impl MemoryDirectory {
    pub fn new(tokens: Arc<MemoryTokenStore>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            tokens,
        })
    }

    pub fn add_user(&self, login: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            name: login.to_string(),
            email: format!("{login}@example.com"),
        };
        let hashed = hash_password(password).unwrap();
        self.users.lock().unwrap().push((user.clone(), hashed));
        user
    }

    pub fn add_to_group(&self, user_id: Uuid, group: &str) {
        self.groups
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push(group.to_string());
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn authenticate(&self, login: &str, password: &str) -> anyhow::Result<Option<User>> {
        let entry = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.login == login)
            .cloned();

        let Some((user, hashed)) = entry else {
            return Ok(None);
        };

        if verify_password(password, &hashed).is_ok_and(|ok| ok) {
            return Ok(Some(user));
        }

        let live = self
            .tokens
            .find(password)
            .await?
            .into_iter()
            .filter(|r| r.user_id == user.id && !r.is_expired())
            .count();

        if live == 1 {
            return Ok(Some(user));
        }
        Ok(None)
    }

    async fn lookup(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone()))
    }

    async fn user_in_group(&self, id: Uuid, group: &str) -> anyhow::Result<bool> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|gs| gs.iter().any(|g| g == group)))
    }
}

pub struct TestBackend {
    pub directory: Arc<MemoryDirectory>,
    pub tokens: Arc<MemoryTokenStore>,
    pub state: AppState,
}

pub fn setup_backend() -> TestBackend {
    let tokens = MemoryTokenStore::new();
    let directory = MemoryDirectory::new(tokens.clone());

    let state = build_app_state(
        directory.clone() as Arc<dyn UserDirectory>,
        tokens.clone() as Arc<dyn TokenStore>,
        test_jwt_config(),
        ApiConfig {
            api_key: "secret".to_string(),
        },
        CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
    );

    TestBackend {
        directory,
        tokens,
        state,
    }
}
