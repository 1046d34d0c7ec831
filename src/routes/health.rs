use crate::AppState;
use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let body = json!({
        "status": "ok",
    });
    (StatusCode::OK, Json(body))
}

/// Per-kind readiness: whether each registered generator's backing model or
/// client is usable right now.
#[axum::debug_handler]
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let generators = state.orchestrator.readiness();
    let any_ready = generators.values().any(|ready| *ready);
    let body = json!({
        "status": if any_ready { "ok" } else { "degraded" },
        "generators": generators,
    });
    (StatusCode::OK, Json(body))
}
