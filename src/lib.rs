//! loyalty-server — loyalty points backend
//!
//! Registered users submit order numbers; a background pipeline polls the
//! external accrual oracle for what each order is worth, and the resulting
//! points can later be spent on other orders. The ledger is append-only and
//! a user's balance can never go negative, even under concurrent
//! withdrawals and accruals.
//!
//! Module map:
//!
//! - [`luhn`] — order number checksum
//! - [`accrual`] — oracle HTTP client
//! - [`store`] — Postgres and in-memory stores for users, orders, ledger
//! - [`pipeline`] — workers, pending-order scanner, rate-limit retry queue
//! - [`service`] — validation and orchestration
//! - [`api`] — axum handlers and router
//! - [`auth`] — JWT mint/verify and bearer middleware

pub mod accrual;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod luhn;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod state;
pub mod store;
pub mod util;
