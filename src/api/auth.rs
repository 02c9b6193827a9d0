//! Registration and login handlers
//!
//! Both reply with the token in the `Authorization` header and in the JSON
//! body.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(req) = payload.map_err(|_| Error::InvalidInput("malformed request body".into()))?;
    let token = state.auth.register(&req.login, &req.password).await?;
    Ok(token_response(token))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(req) = payload.map_err(|_| Error::InvalidInput("malformed request body".into()))?;
    let token = state.auth.login(&req.login, &req.password).await?;
    Ok(token_response(token))
}

fn token_response(token: String) -> Response {
    (
        [(header::AUTHORIZATION, format!("Bearer {token}"))],
        Json(TokenResponse { token }),
    )
        .into_response()
}
