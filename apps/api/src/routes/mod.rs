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
        // Administrative recompute
        .route(
            "/api/v1/admin/matching/candidates/:id/run",
            post(handlers::handle_run_for_candidate),
        )
        .route(
            "/api/v1/admin/matching/opportunities/:kind/:id/run",
            post(handlers::handle_run_for_opportunity),
        )
        .route(
            "/api/v1/admin/matching/candidates/:id/matches",
            get(handlers::handle_candidate_matches),
        )
        // Match views
        .route(
            "/api/v1/matching/candidates/:id/preview",
            get(handlers::handle_candidate_preview),
        )
        .route(
            "/api/v1/matching/opportunities/:kind/:id/matches",
            get(handlers::handle_opportunity_matches),
        )
        // Profile and opportunity change events
        .route("/api/v1/matching/events", post(handlers::handle_event))
        .with_state(state)
}
