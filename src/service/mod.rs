//! Business services sitting between the HTTP surface and the stores

mod auth;
mod balance;
mod orders;

pub use auth::AuthService;
pub use balance::BalanceService;
pub use orders::OrderService;
