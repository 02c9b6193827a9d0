//! Storage layer
//!
//! The stores are the single source of truth; nothing is cached above them.
//! Each trait has a Postgres implementation ([`pg`]) used in production and
//! an in-memory implementation ([`memory`]) used by tests and single-node
//! development runs.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{Balance, LedgerEntry, Order, OrderStatus, User};

/// Outcome of an order submission.
///
/// Order numbers are globally unique; on conflict the winning row decides
/// between "already yours" and "taken by someone else".
#[derive(Debug, Clone)]
pub enum OrderCreate {
    Created(Order),
    AlreadyOwned(Order),
    OwnedByAnother,
}

/// Outcome of recording an accrual.
///
/// At most one accrual entry may exist per order number; a duplicate insert
/// is benign and reported as `AlreadyAccrued` so the pipeline can treat it
/// as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendAccrual {
    Recorded,
    AlreadyAccrued,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`Error::UserAlreadyExists`] when the
    /// login is taken.
    async fn create(&self, login: &str, password_hash: &str) -> Result<User, Error>;

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order with status NEW, resolving number conflicts by owner.
    async fn create(&self, user_id: i64, number: &str) -> Result<OrderCreate, Error>;

    /// Fails with [`Error::NotFound`] for an unknown number.
    async fn get_by_number(&self, number: &str) -> Result<Order, Error>;

    /// All orders of one user, newest upload first.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, Error>;

    /// Write the status (and accrual) observed for an order.
    ///
    /// Idempotent, and monotonic: an order already in a terminal status is
    /// left untouched and the call still succeeds. Fails with
    /// [`Error::NotFound`] for an unknown number.
    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<(), Error>;

    /// Orders still awaiting a terminal verdict, oldest upload first.
    async fn list_pending(&self) -> Result<Vec<Order>, Error>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current and withdrawn totals, folded over the ledger.
    async fn balance(&self, user_id: i64) -> Result<Balance, Error>;

    /// Withdrawal history, newest first, amounts as absolute values.
    async fn withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>, Error>;

    /// Record a positive accrual for an order, deduplicated by order number.
    async fn append_accrual(
        &self,
        user_id: i64,
        order_number: &str,
        amount: f64,
    ) -> Result<AppendAccrual, Error>;

    /// Debit `amount` points against `order_number`.
    ///
    /// The balance check and the ledger append happen inside one atomic unit
    /// serialized per user, so the balance can never be driven negative by
    /// concurrent calls. Fails with [`Error::InsufficientFunds`] when the
    /// balance at commit time is short.
    async fn withdraw(&self, user_id: i64, order_number: &str, amount: f64) -> Result<(), Error>;
}
