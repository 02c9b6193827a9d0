//! Registration and login

use std::sync::Arc;

use crate::error::Error;
use crate::store::UserStore;
use crate::util::{hash_password, verify_password};
use crate::auth;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    min_password_len: usize,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_secret: String, min_password_len: usize) -> Self {
        Self {
            users,
            jwt_secret,
            min_password_len,
        }
    }

    /// Create a user and return a fresh token.
    pub async fn register(&self, login: &str, password: &str) -> Result<String, Error> {
        if login.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput("empty login or password".into()));
        }
        if password.len() < self.min_password_len {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }

        let hash = hash_password(password)
            .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))?;

        let user = self.users.create(login, &hash).await?;

        auth::create_token(user.id, &self.jwt_secret)
            .map_err(|e| Error::Internal(format!("failed to mint token: {e}")))
    }

    /// Verify credentials and return a fresh token.
    pub async fn login(&self, login: &str, password: &str) -> Result<String, Error> {
        if login.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput("empty login or password".into()));
        }

        let user = self
            .users
            .find_by_login(login)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        auth::create_token(user.id, &self.jwt_secret)
            .map_err(|e| Error::Internal(format!("failed to mint token: {e}")))
    }
}
