//! Route modules for the PDF annotator server

pub mod annotate;
pub mod details;
pub mod health;
pub mod token;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .route("/o/token", post(token::exchange_token))
        .merge(details::router(state.clone()))
        .nest("/api/v1", annotate::router(state.clone()))
        .with_state(state)
}
