//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_size();

    Router::new()
        // Health check (for load balancers/probes)
        .route("/health", get(handlers::health_check))
        // Upload data plane: parts and simple uploads arrive as multipart POSTs
        .route("/uploads", post(handlers::upload))
        .route("/uploads/finish", post(handlers::finish_upload))
        // Post-hoc verification for uploads that bypassed this server
        .route("/uploads/success", post(handlers::upload_success))
        // Deletion, including the POST override for clients that cannot
        // issue a real DELETE
        .route(
            "/uploads/{upload_id}",
            post(handlers::delete_upload_post).delete(handlers::delete_upload),
        )
        // Authorization signing
        .route("/signature", post(handlers::sign))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
