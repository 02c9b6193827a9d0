//! Shared test doubles for the integration suites.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use loyalty_server::accrual::{AccrualClient, AccrualOutcome, AccrualReply, AccrualStatus};
use loyalty_server::error::Error;

/// Oracle double that replays a per-order script. The last outcome is
/// sticky, matching a real oracle that keeps answering the same thing.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, VecDeque<AccrualOutcome>>>,
}

impl ScriptedOracle {
    pub async fn script(&self, number: &str, outcomes: Vec<AccrualOutcome>) {
        self.scripts
            .lock()
            .await
            .insert(number.to_string(), outcomes.into());
    }
}

#[async_trait]
impl AccrualClient for ScriptedOracle {
    async fn get_accrual(&self, order_number: &str) -> Result<AccrualOutcome, Error> {
        let mut scripts = self.scripts.lock().await;
        let queue = scripts
            .get_mut(order_number)
            .ok_or_else(|| Error::Accrual(format!("no script for order {order_number}")))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| Error::Accrual(format!("script exhausted for {order_number}")))
        }
    }
}

pub fn verdict(number: &str, status: AccrualStatus, accrual: Option<f64>) -> AccrualOutcome {
    AccrualOutcome::Ready(AccrualReply {
        order: number.to_string(),
        status,
        accrual,
    })
}
