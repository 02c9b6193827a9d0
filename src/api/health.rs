//! Health and readiness probes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::state::AppState;

/// GET /health — liveness, no dependencies touched.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "loyalty-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready — 503 until the database answers.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    match &state.pool {
        Some(pool) => match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
            Ok(_) => StatusCode::OK,
            Err(e) => {
                tracing::warn!(error = %e, "readiness probe failed");
                StatusCode::SERVICE_UNAVAILABLE
            }
        },
        // In-memory mode has no external dependency to wait for.
        None => StatusCode::OK,
    }
}
