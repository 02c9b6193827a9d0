//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::service::{AuthService, BalanceService, OrderService};
use crate::store::{LedgerStore, OrderStore, UserStore};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool backing the readiness probe; absent when the server
    /// runs on the in-memory store.
    pub pool: Option<PgPool>,
    pub auth: Arc<AuthService>,
    pub orders: Arc<OrderService>,
    pub balance: Arc<BalanceService>,
    /// JWT secret for the auth middleware
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(
        pool: Option<PgPool>,
        users: Arc<dyn UserStore>,
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn LedgerStore>,
        jwt_secret: String,
        min_password_len: usize,
    ) -> Self {
        Self {
            pool,
            auth: Arc::new(AuthService::new(users, jwt_secret.clone(), min_password_len)),
            orders: Arc::new(OrderService::new(orders)),
            balance: Arc::new(BalanceService::new(ledger)),
            jwt_secret,
        }
    }
}
