//! Balance, withdrawal and withdrawal-history handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::Error;
use crate::model::Balance;
use crate::state::AppState;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Balance>, Error> {
    let balance = state.balance.get_balance(user.user_id).await?;
    Ok(Json(balance))
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: f64,
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let Json(req) = payload.map_err(|_| Error::InvalidInput("malformed request body".into()))?;
    state
        .balance
        .withdraw(user.user_id, &req.order, req.sum)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /api/user/withdrawals — 204 when the user has none.
pub async fn withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, Error> {
    let withdrawals = state.balance.get_withdrawals(user.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}
