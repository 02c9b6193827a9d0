//! Accrual oracle client
//!
//! The oracle is authoritative about what an order is worth. One HTTP GET
//! per poll; the four-way response contract maps onto [`AccrualOutcome`]:
//!
//! - 200 — a verdict with status and optional accrual
//! - 204 — the oracle has not registered the order yet
//! - 429 — back off for `Retry-After` seconds
//! - anything else — transient error, surfaced as `Err`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Order status as reported by the oracle.
///
/// `Registered` exists only on the wire; the pipeline maps it to the local
/// `PROCESSING` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

/// Successful (200) oracle response body.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualReply {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<f64>,
}

/// One poll outcome. Rate limiting is data, not control flow.
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    Ready(AccrualReply),
    NotRegistered,
    RateLimited(Duration),
}

#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn get_accrual(&self, order_number: &str) -> Result<AccrualOutcome, Error>;
}

/// HTTP client against the real accrual service.
pub struct HttpAccrualClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAccrualClient {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build accrual client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn get_accrual(&self, order_number: &str) -> Result<AccrualOutcome, Error> {
        let url = format!("{}/api/orders/{}", self.base_url, order_number);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Accrual(format!("request for order {order_number}: {e}")))?;

        match resp.status() {
            StatusCode::OK => {
                let reply: AccrualReply = resp.json().await.map_err(|e| {
                    Error::Accrual(format!("decoding reply for order {order_number}: {e}"))
                })?;
                Ok(AccrualOutcome::Ready(reply))
            }
            StatusCode::NO_CONTENT => Ok(AccrualOutcome::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                // An unparsable Retry-After degrades to an immediate retry.
                let seconds = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(0);
                Ok(AccrualOutcome::RateLimited(Duration::from_secs(seconds)))
            }
            status => Err(Error::Accrual(format!(
                "unexpected status {status} for order {order_number}"
            ))),
        }
    }
}
