use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Error;
use crate::model::User;
use crate::store::UserStore;

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, login: &str, password_hash: &str) -> Result<User, Error> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (login, password_hash)
             VALUES ($1, $2)
             RETURNING id, login, password_hash, created_at",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if super::is_unique_violation(&e) {
                Error::UserAlreadyExists
            } else {
                e.into()
            }
        })?;

        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, login, password_hash, created_at FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
