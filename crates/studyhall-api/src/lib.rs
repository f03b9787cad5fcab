//! # studyhall-api
//!
//! Small REST surface for the real-time core: room discovery, administrative
//! maintenance, and health. The productivity CRUD (tasks, notes, songs,
//! leetcode, auth) is served by external collaborators and never passes
//! through here.

pub mod routes;

use axum::Router;
use std::sync::Arc;
use studyhall_gateway::registry::RoomRegistry;
use studyhall_signal::registry::SignalRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: studyhall_db::Database,
    /// Chat membership registry — shared with the chat relay for stats.
    pub chat_registry: RoomRegistry,
    /// Video participant registry — shared with the signaling relay for stats.
    pub signal_registry: SignalRegistry,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::rooms::router())
        .merge(routes::admin::router())
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
