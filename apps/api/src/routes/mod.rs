pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::extraction::handlers::handle_extract;
use crate::generation::handlers::handle_generate;
use crate::settings::handlers::{handle_get_settings, handle_put_settings};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation stream
        .route("/generate", post(handle_generate))
        // Extraction API
        .route("/api/v1/extract", post(handle_extract))
        // Settings API
        .route(
            "/api/v1/settings",
            get(handle_get_settings).put(handle_put_settings),
        )
        .with_state(state)
}
