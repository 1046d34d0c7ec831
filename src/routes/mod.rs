pub mod generate;
pub mod health;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Full application router: generation endpoints behind the rate limiter,
/// health endpoints outside it.
pub fn router(state: AppState, generate_rps: u32) -> Router {
    let generate_api = Router::new()
        .route("/generate/statements", post(generate::generate_statements))
        .route("/generate/batch", post(generate::generate_batch))
        .route("/generate/text", post(generate::generate_from_text))
        .route("/generate/qa", post(generate::generate_qa))
        .layer(axum::middleware::from_fn_with_state(
            crate::middleware::rate_limit::new_rps_state(generate_rps),
            crate::middleware::rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .merge(generate_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
