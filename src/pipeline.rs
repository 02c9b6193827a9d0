//! Accrual pipeline
//!
//! Drives every submitted order through its status machine by polling the
//! accrual oracle. Three cooperating activities share two bounded queues:
//!
//! - a periodic **scanner** re-enumerates pending orders into the work
//!   queue, dropping what does not fit (the next scan recovers it);
//! - **workers** dequeue order numbers, poll the oracle and write the
//!   observed status, appending a ledger accrual on a PROCESSED verdict;
//! - a **retry mover** holds rate-limited orders until their back-off has
//!   elapsed, then feeds them back into the work queue.
//!
//! A rate-limited poll never sleeps the worker that received it; the order
//! goes to the retry queue and the worker moves on. Every loss path (full
//! queue, transient error, crash between status write and ledger append) is
//! recovered by the scanner re-enumerating anything still pending.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::accrual::{AccrualClient, AccrualOutcome, AccrualStatus};
use crate::model::OrderStatus;
use crate::store::{AppendAccrual, LedgerStore, OrderStore};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent pollers
    pub workers: usize,
    /// Capacity of the work and retry queues
    pub queue_capacity: usize,
    /// Period of the pending-order scanner
    pub scan_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 100,
            scan_interval: Duration::from_secs(10),
        }
    }
}

/// An order deferred because the oracle asked for back-off.
struct RetryEntry {
    number: String,
    not_before: Instant,
}

/// Running pipeline handle. Dropping it does not stop the tasks; call
/// [`Pipeline::shutdown`] for an orderly stop.
pub struct Pipeline {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Pipeline {
    /// Spawn workers, scanner and retry mover.
    pub fn spawn(
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn LedgerStore>,
        client: Arc<dyn AccrualClient>,
        config: PipelineConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let capacity = config.queue_capacity.max(1);
        let (work_tx, work_rx) = mpsc::channel::<String>(capacity);
        let (retry_tx, retry_rx) = mpsc::channel::<RetryEntry>(capacity);
        // Workers share one receiver; whoever takes the lock next serves
        // the next order.
        let work_rx = Arc::new(Mutex::new(work_rx));

        let poller = Arc::new(Poller {
            orders: orders.clone(),
            ledger,
            client,
            retry_tx,
        });

        let mut tasks = Vec::new();
        for id in 0..config.workers.max(1) {
            tasks.push((
                "worker",
                tokio::spawn(worker_loop(
                    id,
                    poller.clone(),
                    work_rx.clone(),
                    cancel.clone(),
                )),
            ));
        }
        tasks.push((
            "scanner",
            tokio::spawn(scanner_loop(
                orders,
                work_tx.clone(),
                config.scan_interval,
                cancel.clone(),
            )),
        ));
        tasks.push((
            "retry-mover",
            tokio::spawn(retry_loop(retry_rx, work_tx, cancel.clone())),
        ));

        tracing::info!(
            workers = config.workers.max(1),
            queue_capacity = capacity,
            scan_interval = ?config.scan_interval,
            "accrual pipeline started"
        );

        Self { cancel, tasks }
    }

    /// Cancel all tasks and wait for them to finish.
    pub async fn shutdown(self) {
        tracing::info!("stopping accrual pipeline");
        self.cancel.cancel();
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => tracing::debug!(task = name, "task stopped"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = name, "task cancelled"),
                Err(e) => tracing::error!(task = name, error = ?e, "task panicked"),
            }
        }
        tracing::info!("accrual pipeline stopped");
    }
}

async fn worker_loop(
    id: usize,
    poller: Arc<Poller>,
    work_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id = id, "worker started");
    loop {
        let number = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = rx.recv() => match maybe {
                    Some(number) => number,
                    None => break,
                },
            }
        };
        poller.process(&number, &cancel).await;
    }
    tracing::debug!(worker_id = id, "worker stopped");
}

async fn scanner_loop(
    orders: Arc<dyn OrderStore>,
    work_tx: mpsc::Sender<String>,
    scan_interval: Duration,
    cancel: CancellationToken,
) {
    // The first tick fires immediately, so a restart picks up the backlog
    // without waiting a full interval.
    let mut ticker = time::interval(scan_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let pending = match orders.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "failed to list pending orders");
                continue;
            }
        };

        for order in pending {
            match work_tx.try_send(order.number) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(number)) => {
                    tracing::warn!(order = %number, "work queue full, order waits for next scan");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            }
        }
    }
    tracing::debug!("scanner stopped");
}

async fn retry_loop(
    mut retry_rx: mpsc::Receiver<RetryEntry>,
    work_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        let entry = tokio::select! {
            _ = cancel.cancelled() => break,
            maybe = retry_rx.recv() => match maybe {
                Some(entry) => entry,
                None => break,
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = time::sleep_until(entry.not_before) => {}
        }

        match work_tx.try_send(entry.number) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(number)) => {
                tracing::debug!(order = %number, "work queue full, retry left to the scanner");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
    tracing::debug!("retry mover stopped");
}

/// Per-order polling logic shared by all workers.
struct Poller {
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn LedgerStore>,
    client: Arc<dyn AccrualClient>,
    retry_tx: mpsc::Sender<RetryEntry>,
}

impl Poller {
    async fn process(&self, number: &str, cancel: &CancellationToken) {
        // The oracle call is abandoned on shutdown; store writes, once
        // started, run to completion.
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.client.get_accrual(number) => result,
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(order = %number, error = %e, "accrual poll failed, waiting for next scan");
                return;
            }
        };

        match outcome {
            AccrualOutcome::NotRegistered => {
                // Accepted locally but unknown to the oracle yet; the next
                // scan polls again.
                self.set_status(number, OrderStatus::Processing, None).await;
            }
            AccrualOutcome::RateLimited(delay) => {
                tracing::warn!(order = %number, delay = ?delay, "rate limited by accrual service");
                let entry = RetryEntry {
                    number: number.to_string(),
                    not_before: Instant::now() + delay,
                };
                if let Err(mpsc::error::TrySendError::Full(entry)) = self.retry_tx.try_send(entry)
                {
                    tracing::warn!(order = %entry.number, "retry queue full, order waits for next scan");
                }
            }
            AccrualOutcome::Ready(reply) => match reply.status {
                AccrualStatus::Registered | AccrualStatus::Processing => {
                    self.set_status(number, OrderStatus::Processing, None).await;
                }
                AccrualStatus::Invalid => {
                    self.set_status(number, OrderStatus::Invalid, None).await;
                }
                AccrualStatus::Processed => {
                    // The terminal status is written before the ledger
                    // append; a crash in between is healed by the scanner
                    // re-polling and the accrual dedup.
                    if !self
                        .set_status(number, OrderStatus::Processed, reply.accrual)
                        .await
                    {
                        return;
                    }
                    let amount = reply.accrual.unwrap_or(0.0);
                    if amount > 0.0 {
                        self.record_accrual(number, amount).await;
                    }
                }
            },
        }
    }

    async fn set_status(&self, number: &str, status: OrderStatus, accrual: Option<f64>) -> bool {
        match self.orders.update_status(number, status, accrual).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(order = %number, status = ?status, error = %e, "failed to update order status");
                false
            }
        }
    }

    async fn record_accrual(&self, number: &str, amount: f64) {
        let order = match self.orders.get_by_number(number).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(order = %number, error = %e, "failed to load order for accrual");
                return;
            }
        };

        match self
            .ledger
            .append_accrual(order.user_id, number, amount)
            .await
        {
            Ok(AppendAccrual::Recorded) => {
                tracing::info!(order = %number, accrual = amount, "order processed, points accrued");
            }
            Ok(AppendAccrual::AlreadyAccrued) => {
                tracing::debug!(order = %number, "accrual already recorded");
            }
            Err(e) => {
                tracing::error!(order = %number, error = %e, "failed to record accrual");
            }
        }
    }
}
