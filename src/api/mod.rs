//! HTTP API module
//!
//! Endpoint handlers plus their request and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", post(create_timer_handler).get(list_timers_handler))
        .route("/timers/:id", get(get_timer_handler).delete(delete_timer_handler))
        .route("/timers/:id/start", post(start_handler))
        .route("/timers/:id/pause", post(pause_handler))
        .route("/timers/:id/reset", post(reset_handler))
        .route("/timers/:id/toggle", post(toggle_handler))
        .route("/timers/:id/seconds", put(set_seconds_handler))
        .route("/timers/:id/preset", post(preset_handler))
        .route("/timers/:id/adjust", post(adjust_handler))
        .route("/timers/:id/visibility", post(visibility_handler))
        .route("/timers/:id/events", get(events_handler))
        .route(
            "/notifications/permission",
            get(permission_handler).post(request_permission_handler),
        )
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
