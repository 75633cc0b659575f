//! Middleware: the app-key guard for REST ingress. WebSocket identity is checked in the ws handler.

pub mod auth;

pub use auth::require_app_key;
