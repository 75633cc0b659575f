//! Typing indicators: best-effort forward to the receiver's live connection.

use uuid::Uuid;

use super::presence::PresenceRegistry;
use crate::models::{ServerEvent, TypingNotice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Started,
    Stopped,
}

/// Never queued or persisted. Returns whether the receiver was reachable.
pub fn relay_typing(
    presence: &PresenceRegistry,
    sender_id: Uuid,
    receiver_id: Uuid,
    signal: TypingSignal,
) -> bool {
    let data = TypingNotice { sender_id };
    let event = match signal {
        TypingSignal::Started => ServerEvent::Typing { data },
        TypingSignal::Stopped => ServerEvent::StopTyping { data },
    };
    presence.send_to_user(receiver_id, &event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionId;
    use crate::services::presence::ConnectionHandle;
    use tokio::sync::mpsc;

    #[test]
    fn forwards_to_receiver_only() {
        let mut presence = PresenceRegistry::new();
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.register(receiver, ConnectionHandle::new(ConnectionId::generate(), tx));
        while rx.try_recv().is_ok() {}

        assert!(relay_typing(&presence, sender, receiver, TypingSignal::Started));
        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["senderId"], serde_json::json!(sender));

        assert!(relay_typing(&presence, sender, receiver, TypingSignal::Stopped));
        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], "stopTyping");
    }

    #[test]
    fn drops_when_receiver_offline() {
        let presence = PresenceRegistry::new();
        assert!(!relay_typing(
            &presence,
            Uuid::new_v4(),
            Uuid::new_v4(),
            TypingSignal::Started
        ));
    }
}
