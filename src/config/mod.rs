//! Application configuration loaded from environment.

use std::net::SocketAddr;
use std::time::Duration;

/// Default suppression window for duplicate call-log entries.
pub const DEFAULT_CALL_LOG_WINDOW_SECS: u64 = 15;

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:3000`).
    pub server_addr: SocketAddr,
    /// PostgreSQL connection URL. When unset the relay runs on in-memory stores.
    pub database_url: Option<String>,
    /// Shared key the REST layer sends in `x-app-key` to reach `/api/*`.
    pub app_key: String,
    /// HS256 secret used to validate WebSocket connection tokens (min 32 chars).
    pub jwt_secret: String,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    /// Window within which repeated call ends for the same pair log only once.
    pub call_log_window: Duration,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let server_addr = std::env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let app_key = std::env::var("APP_KEY").unwrap_or_else(|_| "callrelay_key".to_string());
        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "callrelay_jwt_secret_change_in_production".to_string());
        if jwt_secret.len() < 32 {
            return Err(ConfigLoadError::WeakJwtSecret);
        }
        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let call_log_window = match std::env::var("CALL_LOG_WINDOW_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigLoadError::InvalidCallLogWindow)?,
            Err(_) => DEFAULT_CALL_LOG_WINDOW_SECS,
        };
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_addr,
            database_url,
            app_key,
            jwt_secret,
            cors_origin,
            call_log_window: Duration::from_secs(call_log_window),
            log_level,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("JWT_SECRET must be at least 32 characters")]
    WeakJwtSecret,
    #[error("Invalid CALL_LOG_WINDOW_SECS")]
    InvalidCallLogWindow,
}
