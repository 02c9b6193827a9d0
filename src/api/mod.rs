//! HTTP surface
//!
//! Public routes: registration, login, health probes. Everything under
//! `/api/user` except register/login sits behind the bearer-token
//! middleware.

pub mod auth;
pub mod balance;
pub mod health;
pub mod orders;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/user/orders", post(orders::submit).get(orders::list))
        .route("/api/user/balance", get(balance::get_balance))
        .route("/api/user/balance/withdraw", post(balance::withdraw))
        .route("/api/user/withdrawals", get(balance::withdrawals))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/user/register", post(auth::register))
        .route("/api/user/login", post(auth::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
