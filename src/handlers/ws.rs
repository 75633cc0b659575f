//! WebSocket handler: token identity, frame parsing, and hand-off to the relay loop.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::models::{ClientEvent, ConnectionEstablished, ConnectionId, ServerEvent};
use crate::services::ConnectionHandle;

/// Upgrade HTTP to WebSocket. A `token` query parameter identifies the user; without one the
/// socket is anonymous and only receives presence broadcasts. A bad token is answered with
/// 401 before the upgrade itself is checked.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let user_id = connection_identity(&state, params.get("token").map(String::as_str))?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, user_id)))
}

pub(crate) fn connection_identity(
    state: &AppState,
    token: Option<&str>,
) -> Result<Option<Uuid>, AppError> {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => state.jwt_secret().validate(token).map(Some),
        None => Ok(None),
    }
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: Option<Uuid>) {
    let conn_id = ConnectionId::generate();
    info!(conn_id = %conn_id, user_id = ?user_id, "ws connected");

    let (mut sender, mut receiver) = socket.split();

    let established = ServerEvent::ConnectionEstablished {
        data: ConnectionEstablished {
            socket_id: conn_id.to_string(),
        },
    };
    let Ok(text) = serde_json::to_string(&established) else {
        return;
    };
    if sender.send(Message::Text(text)).await.is_err() {
        return;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let local = ConnectionHandle::new(conn_id.clone(), tx.clone());
    if state.relay().connect(user_id, ConnectionHandle::new(conn_id.clone(), tx)).is_err() {
        warn!(conn_id = %conn_id, "relay unavailable, closing socket");
        send_task.abort();
        return;
    }

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "ignoring malformed frame");
                        continue;
                    }
                };
                if matches!(event, ClientEvent::Ping) {
                    local.send(&ServerEvent::Pong);
                    continue;
                }
                let Some(user_id) = user_id else {
                    debug!(conn_id = %conn_id, "ignoring event from anonymous socket");
                    continue;
                };
                if state.relay().client_event(user_id, conn_id.clone(), event).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    let _ = state.relay().disconnect(user_id, conn_id.clone());
    send_task.abort();
    info!(conn_id = %conn_id, "ws disconnected");
}

#[cfg(test)]
mod tests {
    use super::connection_identity;
    use crate::auth::JwtSecret;
    use crate::handlers::http::AppState;
    use crate::repositories::MemoryRepository;
    use crate::services::Relay;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn state() -> AppState {
        let repo = Arc::new(MemoryRepository::new());
        let (_relay, handle) = Relay::new(repo.clone(), repo, Duration::from_secs(15));
        AppState {
            app_key: "key".to_string(),
            relay: handle,
            jwt_secret: JwtSecret::new("test-jwt-secret-min-32-chars!!!!".to_string()),
        }
    }

    #[test]
    fn missing_or_blank_token_is_anonymous() {
        let state = state();
        assert_eq!(connection_identity(&state, None).unwrap(), None);
        assert_eq!(connection_identity(&state, Some("  ")).unwrap(), None);
    }

    #[test]
    fn valid_token_yields_user() {
        let state = state();
        let user = Uuid::new_v4();
        let token = state
            .jwt_secret()
            .issue(user, chrono::Duration::minutes(1))
            .unwrap();
        assert_eq!(connection_identity(&state, Some(&token)).unwrap(), Some(user));
    }

    #[test]
    fn invalid_token_is_rejected() {
        let state = state();
        assert!(connection_identity(&state, Some("garbage")).is_err());
    }
}
