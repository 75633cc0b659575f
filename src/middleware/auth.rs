//! App-key guard for the REST-facing `/api/*` routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::handlers::http::AppState;

const HEADER_APP_KEY: &str = "x-app-key";

/// Middleware: require `x-app-key` to match the configured app key.
pub async fn require_app_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(HEADER_APP_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if key.is_empty() || key != state.app_key {
        debug!(path = %request.uri().path(), "rejected request: invalid or missing x-app-key");
        return Err(AppError::Auth("invalid or missing x-app-key".to_string()));
    }

    Ok(next.run(request).await)
}
