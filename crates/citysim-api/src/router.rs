//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router with CORS open to any origin and HTTP
/// request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/cities", get(handlers::list_cities).post(handlers::create_city))
        .route("/cities/{id}", get(handlers::get_city).delete(handlers::delete_city))
        .route("/cities/{id}/cars", get(handlers::list_cars).post(handlers::start_cars))
        .route("/cities/{id}/cars/following/{vin}", post(handlers::start_followers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
