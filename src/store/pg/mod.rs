//! Postgres store implementations
//!
//! SQL semantics the services rely on:
//!
//! - `orders.number` UNIQUE disambiguates concurrent submissions; the insert
//!   loses, the follow-up read observes the winning row.
//! - the partial unique index on `transactions(order_number) WHERE
//!   type = 'accrual'` makes accrual appends idempotent.
//! - withdrawals take `pg_advisory_xact_lock(user_id)` inside a transaction,
//!   so the balance re-read and the debit insert form one serialized unit
//!   per user.

mod ledger;
mod orders;
mod users;

pub use ledger::PgLedgerStore;
pub use orders::PgOrderStore;
pub use users::PgUserStore;

/// True when `err` is a unique-constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
