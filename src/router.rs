use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        // Chat webhook
        .route("/", post(handlers::webhook::receive))
        // Health check
        .route("/healthz", get(handlers::healthcheck))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
