pub mod health;
pub mod layout;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyze", post(layout::handle_analyze))
        .route("/api/v1/fit", post(layout::handle_fit))
        .route("/api/v1/reconstruct", post(layout::handle_reconstruct))
        .with_state(state)
}
