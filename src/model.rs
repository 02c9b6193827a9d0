//! Domain types shared by the stores, services and HTTP surface
//!
//! Serialization on these types is the external JSON contract: orders render
//! as `{number, status, accrual?, uploaded_at}` and withdrawals as
//! `{order, sum, processed_at}` with RFC 3339 timestamps.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered user. The password hash never leaves the auth layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a submitted order.
///
/// Transitions are monotonic forward: NEW -> PROCESSING -> {PROCESSED,
/// INVALID}, with NEW allowed to jump straight to a terminal state when the
/// oracle answers on the first poll. There is deliberately no local
/// `REGISTERED` state; the oracle's `REGISTERED` maps to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn as_db(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatus::New),
            "PROCESSING" => Some(OrderStatus::Processing),
            "INVALID" => Some(OrderStatus::Invalid),
            "PROCESSED" => Some(OrderStatus::Processed),
            _ => None,
        }
    }

    /// Terminal statuses are never left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

/// A user-submitted order number being valued by the accrual oracle.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Accrual,
    Withdrawal,
}

impl EntryKind {
    pub fn as_db(self) -> &'static str {
        match self {
            EntryKind::Accrual => "accrual",
            EntryKind::Withdrawal => "withdrawal",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "accrual" => Some(EntryKind::Accrual),
            "withdrawal" => Some(EntryKind::Withdrawal),
            _ => None,
        }
    }
}

/// One immutable signed-amount record against a user's account.
///
/// Stored amounts are signed (positive accrual, negative withdrawal); the
/// store returns withdrawal amounts as absolute values, which is what the
/// `sum` field renders.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "order")]
    pub order_number: String,
    #[serde(rename = "sum")]
    pub amount: f64,
    #[serde(skip)]
    pub kind: EntryKind,
    pub processed_at: DateTime<Utc>,
}

/// Derived account balance: a fold over the ledger, never stored.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Balance {
    pub current: f64,
    pub withdrawn: f64,
}
