//! In-memory store
//!
//! Implements every store trait over one mutex-guarded state, which makes
//! each operation (including the withdrawal's balance-check-then-append)
//! atomic. Single-instance only; used by the test suite and for running the
//! service without Postgres.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::model::{Balance, EntryKind, LedgerEntry, Order, OrderStatus, User};
use crate::store::{AppendAccrual, LedgerStore, OrderCreate, OrderStore, UserStore};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    orders: Vec<Order>,
    ledger: Vec<LedgerEntry>,
    next_user_id: i64,
    next_order_id: i64,
    next_entry_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, login: &str, password_hash: &str) -> Result<User, Error> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.login == login) {
            return Err(Error::UserAlreadyExists);
        }
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.login == login).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, user_id: i64, number: &str) -> Result<OrderCreate, Error> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.orders.iter().find(|o| o.number == number) {
            return Ok(if existing.user_id == user_id {
                OrderCreate::AlreadyOwned(existing.clone())
            } else {
                OrderCreate::OwnedByAnother
            });
        }
        inner.next_order_id += 1;
        let order = Order {
            id: inner.next_order_id,
            user_id,
            number: number.to_string(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: Utc::now(),
        };
        inner.orders.push(order.clone());
        Ok(OrderCreate::Created(order))
    }

    async fn get_by_number(&self, number: &str) -> Result<Order, Error> {
        let inner = self.inner.lock().await;
        inner
            .orders
            .iter()
            .find(|o| o.number == number)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, Error> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.number == number)
            .ok_or(Error::NotFound)?;
        // Terminal statuses stick.
        if !order.status.is_terminal() {
            order.status = status;
            order.accrual = accrual;
        }
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Order>, Error> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(orders)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balance(&self, user_id: i64) -> Result<Balance, Error> {
        let inner = self.inner.lock().await;
        Ok(fold_balance(&inner.ledger, user_id))
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>, Error> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<LedgerEntry> = inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id && e.kind == EntryKind::Withdrawal)
            .cloned()
            .map(|mut e| {
                e.amount = e.amount.abs();
                e
            })
            .collect();
        entries.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(entries)
    }

    async fn append_accrual(
        &self,
        user_id: i64,
        order_number: &str,
        amount: f64,
    ) -> Result<AppendAccrual, Error> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner
            .ledger
            .iter()
            .any(|e| e.kind == EntryKind::Accrual && e.order_number == order_number);
        if duplicate {
            return Ok(AppendAccrual::AlreadyAccrued);
        }
        inner.next_entry_id += 1;
        let entry = LedgerEntry {
            id: inner.next_entry_id,
            user_id,
            order_number: order_number.to_string(),
            amount,
            kind: EntryKind::Accrual,
            processed_at: Utc::now(),
        };
        inner.ledger.push(entry);
        Ok(AppendAccrual::Recorded)
    }

    async fn withdraw(&self, user_id: i64, order_number: &str, amount: f64) -> Result<(), Error> {
        // Holding the state lock across check and append serializes all
        // ledger writers, the in-memory stand-in for the per-user advisory
        // lock.
        let mut inner = self.inner.lock().await;
        let balance = fold_balance(&inner.ledger, user_id);
        if balance.current < amount {
            return Err(Error::InsufficientFunds);
        }
        inner.next_entry_id += 1;
        let entry = LedgerEntry {
            id: inner.next_entry_id,
            user_id,
            order_number: order_number.to_string(),
            amount: -amount,
            kind: EntryKind::Withdrawal,
            processed_at: Utc::now(),
        };
        inner.ledger.push(entry);
        Ok(())
    }
}

fn fold_balance(ledger: &[LedgerEntry], user_id: i64) -> Balance {
    let mut accrued = 0.0;
    let mut withdrawn = 0.0;
    for entry in ledger.iter().filter(|e| e.user_id == user_id) {
        if entry.amount > 0.0 {
            accrued += entry.amount;
        } else {
            withdrawn += entry.amount.abs();
        }
    }
    Balance {
        current: accrued - withdrawn,
        withdrawn,
    }
}
