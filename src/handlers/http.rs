//! HTTP handlers: message delivery from the REST layer, presence snapshot, health.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use validator::Validate;

use crate::auth::JwtSecret;
use crate::error::AppError;
use crate::models::{ChatMessage, PresenceSnapshot};
use crate::services::RelayHandle;

/// Shared application state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub app_key: String,
    pub relay: RelayHandle,
    pub jwt_secret: JwtSecret,
}

impl AppState {
    pub fn relay(&self) -> &RelayHandle {
        &self.relay
    }
    pub fn jwt_secret(&self) -> &JwtSecret {
        &self.jwt_secret
    }
}

/// POST /api/messages/new: push a message the REST layer just stored.
pub async fn deliver_new(
    State(state): State<AppState>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<serde_json::Value>, AppError> {
    message
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let id = message.id;
    state.relay().deliver_new(message)?;
    Ok(Json(json!({ "ok": true, "messageId": id })))
}

/// POST /api/messages/edited: notify both participants of an edit.
pub async fn deliver_edited(
    State(state): State<AppState>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<serde_json::Value>, AppError> {
    message
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if !message.edited {
        return Err(AppError::Validation("message is not marked edited".to_string()));
    }
    let id = message.id;
    state.relay().deliver_edited(message)?;
    Ok(Json(json!({ "ok": true, "messageId": id })))
}

/// GET /api/presence: current online and busy sets.
pub async fn presence(State(state): State<AppState>) -> Result<Json<PresenceSnapshot>, AppError> {
    Ok(Json(state.relay().snapshot().await?))
}

/// GET /health: liveness probe.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "callrelay" })),
    )
}
