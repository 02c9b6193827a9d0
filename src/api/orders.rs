//! Order submission and listing handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use crate::auth::AuthUser;
use crate::error::Error;
use crate::state::AppState;

/// POST /api/user/orders — body is the order number as text/plain.
///
/// 202 on acceptance; 200 when the caller already submitted this number.
pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: String,
) -> Response {
    let number = body.trim();
    if number.is_empty() {
        return Error::InvalidInput("empty order number".into()).into_response();
    }

    match state.orders.submit(user.user_id, number).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(Error::OrderAlreadyAccepted) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/user/orders — 204 when the user has none.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, Error> {
    let orders = state.orders.list(user.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(orders).into_response())
}
