//! Data models for calls, wire events, messages, and presence.

pub mod call;
pub mod event;
pub mod message;
pub mod presence;

pub use call::*;
pub use event::*;
pub use message::*;
pub use presence::*;
