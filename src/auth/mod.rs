//! Connection identity: JWT validation for WebSocket sessions.

mod jwt;

pub use jwt::{Claims, JwtSecret};
