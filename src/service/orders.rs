//! Order submission and listing

use std::sync::Arc;

use crate::error::Error;
use crate::luhn;
use crate::model::Order;
use crate::store::{OrderCreate, OrderStore};

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Accept an order number for processing.
    ///
    /// Re-submission by the owner reports [`Error::OrderAlreadyAccepted`];
    /// a number claimed by someone else reports
    /// [`Error::OrderOwnedByAnother`].
    pub async fn submit(&self, user_id: i64, number: &str) -> Result<(), Error> {
        if !luhn::validate(number) {
            return Err(Error::InvalidOrderNumber);
        }

        match self.orders.create(user_id, number).await? {
            OrderCreate::Created(order) => {
                tracing::info!(order = %order.number, user_id, "order accepted");
                Ok(())
            }
            OrderCreate::AlreadyOwned(_) => Err(Error::OrderAlreadyAccepted),
            OrderCreate::OwnedByAnother => Err(Error::OrderOwnedByAnother),
        }
    }

    /// All orders of `user_id`, newest upload first.
    pub async fn list(&self, user_id: i64) -> Result<Vec<Order>, Error> {
        self.orders.list_by_user(user_id).await
    }
}
