//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/sites", get(handlers::list_sites))
        // Search jobs
        .route("/api/search", post(handlers::start_search))
        .route(
            "/api/search/:job_id",
            get(handlers::job_progress).delete(handlers::remove_job),
        )
        .route("/api/search/:job_id/result", get(handlers::job_result))
        .route("/api/search/:job_id/cancel", post(handlers::cancel_job))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
