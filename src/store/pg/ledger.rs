use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Error;
use crate::model::{Balance, EntryKind, LedgerEntry};
use crate::store::{AppendAccrual, LedgerStore};

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    user_id: i64,
    order_number: String,
    amount: f64,
    #[sqlx(rename = "type")]
    kind: String,
    processed_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self) -> Result<LedgerEntry, Error> {
        let kind = EntryKind::from_db(&self.kind).ok_or_else(|| {
            Error::Internal(format!("ledger entry {} has unknown type", self.id))
        })?;
        Ok(LedgerEntry {
            id: self.id,
            user_id: self.user_id,
            order_number: self.order_number,
            amount: self.amount,
            kind,
            processed_at: self.processed_at,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn balance(&self, user_id: i64) -> Result<Balance, Error> {
        let (accrued, withdrawn) = sqlx::query_as::<_, (f64, f64)>(
            "SELECT
                COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount < 0 THEN ABS(amount) ELSE 0 END), 0)
             FROM transactions
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Balance {
            current: accrued - withdrawn,
            withdrawn,
        })
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>, Error> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT id, user_id, order_number, ABS(amount) AS amount, type, processed_at
             FROM transactions
             WHERE user_id = $1 AND type = 'withdrawal'
             ORDER BY processed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    async fn append_accrual(
        &self,
        user_id: i64,
        order_number: &str,
        amount: f64,
    ) -> Result<AppendAccrual, Error> {
        let result = sqlx::query(
            "INSERT INTO transactions (user_id, order_number, amount, type)
             VALUES ($1, $2, $3, 'accrual')",
        )
        .bind(user_id)
        .bind(order_number)
        .bind(amount)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AppendAccrual::Recorded),
            Err(e) if super::is_unique_violation(&e) => Ok(AppendAccrual::AlreadyAccrued),
            Err(e) => Err(e.into()),
        }
    }

    async fn withdraw(&self, user_id: i64, order_number: &str, amount: f64) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        // Per-user advisory lock, held to the end of this transaction. No
        // other writer can touch this user's ledger between the balance
        // read and the debit insert.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let balance = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if balance < amount {
            return Err(Error::InsufficientFunds);
        }

        sqlx::query(
            "INSERT INTO transactions (user_id, order_number, amount, type)
             VALUES ($1, $2, $3, 'withdrawal')",
        )
        .bind(user_id)
        .bind(order_number)
        .bind(-amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
