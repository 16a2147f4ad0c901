use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::utils::password::verify_password;

use super::model::User;

/// The external user directory and credential store.
///
/// The pipeline never talks to user storage directly; everything it needs
/// is behind this interface.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Checks credentials, returning the user on success. A live access
    /// token is accepted in place of the password, which is what lets
    /// token validation re-authenticate a session from the token alone.
    async fn authenticate(&self, login: &str, password: &str) -> anyhow::Result<Option<User>>;

    async fn lookup(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn user_in_group(&self, id: Uuid, group: &str) -> anyhow::Result<bool>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPassword {
    id: Uuid,
    login: String,
    name: String,
    email: String,
    password: String,
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn authenticate(&self, login: &str, password: &str) -> anyhow::Result<Option<User>> {
        let Some(row) = sqlx::query_as::<_, UserWithPassword>(
            "SELECT id, login, name, email, password FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let user = User {
            id: row.id,
            login: row.login,
            name: row.name,
            email: row.email,
        };

        if verify_password(password, &row.password).is_ok_and(|ok| ok) {
            return Ok(Some(user));
        }

        // token-as-credential fallback
        let (live_tokens,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM access_tokens WHERE token = $1 AND user_id = $2 AND expires > NOW()",
        )
        .bind(password)
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;

        if live_tokens == 1 {
            return Ok(Some(user));
        }
        Ok(None)
    }

    async fn lookup(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, login, name, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn user_in_group(&self, id: Uuid, group: &str) -> anyhow::Result<bool> {
        let (hits,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_groups WHERE user_id = $1 AND group_name = $2",
        )
        .bind(id)
        .bind(group)
        .fetch_one(&self.pool)
        .await?;
        Ok(hits > 0)
    }
}
