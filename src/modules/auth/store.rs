use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::model::AccessToken;

/// Persistence facade for issued tokens.
///
/// Tokens are created once and deleted explicitly; there is no update.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn persist(
        &self,
        token: &str,
        user_id: Uuid,
        expires: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// All records matching the token value. More than one is a
    /// persistence anomaly the caller treats as invalid.
    async fn find(&self, token: &str) -> anyhow::Result<Vec<AccessToken>>;

    async fn delete(&self, token: &str) -> anyhow::Result<()>;
}

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn persist(
        &self,
        token: &str,
        user_id: Uuid,
        expires: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO access_tokens (token, user_id, expires) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, token: &str) -> anyhow::Result<Vec<AccessToken>> {
        let records = sqlx::query_as::<_, AccessToken>(
            "SELECT token, user_id, expires FROM access_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
