//! Real-time presence and call-signaling relay for a chat application.
//!
//! Tracks which users hold a live WebSocket, arbitrates concurrent call attempts,
//! relays WebRTC negotiation messages, and records durable call-log messages.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::relay::{Relay, RelayHandle};

use axum::routing::{get, post};
use handlers::http;

/// Build the router (ws, api, health). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let api_routes = axum::Router::new()
        .route("/messages/new", post(http::deliver_new))
        .route("/messages/edited", post(http::deliver_edited))
        .route("/presence", get(http::presence))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_app_key,
        ));

    axum::Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/health", get(http::health))
        .nest("/api", api_routes)
        .with_state(state)
}
