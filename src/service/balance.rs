//! Balance reads and withdrawals

use std::sync::Arc;

use crate::error::Error;
use crate::luhn;
use crate::model::{Balance, LedgerEntry};
use crate::store::LedgerStore;

pub struct BalanceService {
    ledger: Arc<dyn LedgerStore>,
}

impl BalanceService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn get_balance(&self, user_id: i64) -> Result<Balance, Error> {
        self.ledger.balance(user_id).await
    }

    /// Spend points against an order number.
    ///
    /// The number is only Luhn-checked, never resolved against submitted
    /// orders; it is an audit label on the debit.
    pub async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        amount: f64,
    ) -> Result<(), Error> {
        if !luhn::validate(order_number) {
            return Err(Error::InvalidOrderNumber);
        }
        if amount <= 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount);
        }

        self.ledger.withdraw(user_id, order_number, amount).await?;
        tracing::info!(order = %order_number, user_id, sum = amount, "points withdrawn");
        Ok(())
    }

    pub async fn get_withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>, Error> {
        self.ledger.withdrawals(user_id).await
    }
}
