//! Integration tests: health, app-key guard, message delivery and presence over HTTP.
//!
//! Runs against in-memory stores; no database is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use callrelay::auth::JwtSecret;
use callrelay::models::{ConnectionId, PresenceSnapshot};
use callrelay::repositories::MemoryRepository;
use callrelay::services::ConnectionHandle;
use callrelay::{create_app, AppState, Relay, RelayHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::util::ServiceExt;
use uuid::Uuid;

const APP_KEY: &str = "test-key";

fn test_state() -> AppState {
    let repo = Arc::new(MemoryRepository::new());
    let (relay, _task) = Relay::spawn(repo.clone(), repo, Duration::from_secs(15));
    AppState {
        app_key: APP_KEY.to_string(),
        relay,
        jwt_secret: JwtSecret::new("test-jwt-secret-min-32-chars!!!!".to_string()),
    }
}

async fn online(relay: &RelayHandle, user: Uuid) -> mpsc::UnboundedReceiver<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    relay
        .connect(Some(user), ConnectionHandle::new(ConnectionId::generate(), tx))
        .unwrap();
    relay.snapshot().await.unwrap();
    while rx.try_recv().is_ok() {}
    rx
}

fn message_json(sender: Uuid, receiver: Uuid, edited: bool) -> serde_json::Value {
    serde_json::json!({
        "id": Uuid::new_v4(),
        "senderId": sender,
        "receiverId": receiver,
        "message": "hello",
        "edited": edited,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

fn post(uri: &str, key: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-app-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = create_app(test_state());
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
}

#[tokio::test]
async fn api_requires_app_key() {
    let app = create_app(test_state());
    let body = message_json(Uuid::new_v4(), Uuid::new_v4(), false);

    let res = app
        .clone()
        .oneshot(post("/api/messages/new", None, &body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "missing key should be 401");

    let res = app
        .clone()
        .oneshot(post("/api/messages/new", Some("wrong"), &body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "wrong key should be 401");

    let res = app
        .oneshot(post("/api/messages/new", Some(APP_KEY), &body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "valid key should succeed");
}

#[tokio::test]
async fn delivered_message_reaches_receiver() {
    let state = test_state();
    let relay = state.relay.clone();
    let app = create_app(state);
    let sender = Uuid::new_v4();
    let receiver = Uuid::new_v4();
    let mut rx = online(&relay, receiver).await;

    let res = app
        .oneshot(post("/api/messages/new", Some(APP_KEY), &message_json(sender, receiver, false)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let text = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame["event"], "newMessage");
    assert_eq!(frame["data"]["senderId"], serde_json::json!(sender));
}

#[tokio::test]
async fn edit_notification_requires_edited_flag() {
    let app = create_app(test_state());
    let res = app
        .clone()
        .oneshot(post(
            "/api/messages/edited",
            Some(APP_KEY),
            &message_json(Uuid::new_v4(), Uuid::new_v4(), false),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(post(
            "/api/messages/edited",
            Some(APP_KEY),
            &message_json(Uuid::new_v4(), Uuid::new_v4(), true),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn presence_snapshot_lists_online_users() {
    let state = test_state();
    let relay = state.relay.clone();
    let app = create_app(state);
    let user = Uuid::new_v4();
    let _rx = online(&relay, user).await;

    let req = Request::builder()
        .uri("/api/presence")
        .header("x-app-key", APP_KEY)
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let snapshot: PresenceSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.online, vec![user]);
    assert!(snapshot.busy.is_empty());
}

fn upgrade(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn ws_rejects_invalid_token() {
    let app = create_app(test_state());
    let res = app.oneshot(upgrade("/ws?token=not-a-jwt")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_token_check_passes_valid_and_missing_tokens() {
    let state = test_state();
    let token = state
        .jwt_secret()
        .issue(Uuid::new_v4(), chrono::Duration::minutes(1))
        .unwrap();
    let app = create_app(state);

    let res = app
        .clone()
        .oneshot(upgrade(&format!("/ws?token={}", token)))
        .await
        .unwrap();
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED, "valid token should pass the check");

    let res = app.oneshot(upgrade("/ws")).await.unwrap();
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED, "anonymous sockets are allowed");
}
