use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Error;
use crate::model::{Order, OrderStatus};
use crate::store::{OrderCreate, OrderStore};

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    number: String,
    status: String,
    accrual: Option<f64>,
    uploaded_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, Error> {
        let status = OrderStatus::from_db(&self.status).ok_or_else(|| {
            Error::Internal(format!(
                "order {} has unknown status {:?}",
                self.number, self.status
            ))
        })?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            number: self.number,
            status,
            accrual: self.accrual,
            uploaded_at: self.uploaded_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, number, status, accrual, uploaded_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, user_id: i64, number: &str) -> Result<OrderCreate, Error> {
        let inserted = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (user_id, number, status)
             VALUES ($1, $2, 'NEW')
             RETURNING id, user_id, number, status, accrual, uploaded_at",
        )
        .bind(user_id)
        .bind(number)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(OrderCreate::Created(row.into_order()?)),
            Err(e) if super::is_unique_violation(&e) => {
                // The constraint is the source of truth; read the winner.
                let existing = self.get_by_number(number).await?;
                if existing.user_id == user_id {
                    Ok(OrderCreate::AlreadyOwned(existing))
                } else {
                    Ok(OrderCreate::OwnedByAnother)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_number(&self, number: &str) -> Result<Order, Error> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)?;

        row.into_order()
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, Error> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = $1
             ORDER BY uploaded_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<(), Error> {
        // Terminal rows are left untouched so replayed polls cannot move an
        // order back out of PROCESSED or INVALID.
        let result = sqlx::query(
            "UPDATE orders
             SET status = $1, accrual = $2
             WHERE number = $3 AND status NOT IN ('PROCESSED', 'INVALID')",
        )
        .bind(status.as_db())
        .bind(accrual)
        .bind(number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the order is unknown or it is already terminal.
            self.get_by_number(number).await?;
        }

        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Order>, Error> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE status IN ('NEW', 'PROCESSING')
             ORDER BY uploaded_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }
}
