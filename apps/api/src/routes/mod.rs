pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::matching::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/", get(handlers::show_form).post(handlers::handle_match))
        .route("/api/v1/match", post(handlers::handle_match_api))
        .with_state(state)
}
