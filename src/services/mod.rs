//! Relay services: presence, busy state, typing, call signaling, call logs, and delivery.

pub mod busy;
pub mod call_log;
pub mod delivery;
pub mod presence;
pub mod relay;
pub mod signaling;
pub mod typing;

pub use busy::BusyStateTracker;
pub use call_log::CallLogDeduplicator;
pub use presence::{ConnectionHandle, PresenceRegistry};
pub use relay::{Relay, RelayCommand, RelayHandle};
pub use signaling::{CallSignalingRelay, CallState, FinishedCall, OfferOutcome};
