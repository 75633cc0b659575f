//! Push already-persisted messages to live connections. No queuing: a client that was
//! offline re-fetches history from the REST layer.

use tracing::debug;
use uuid::Uuid;

use super::presence::PresenceRegistry;
use crate::models::{ChatMessage, ServerEvent};

/// `newMessage` to the receiver.
pub fn deliver_new(presence: &PresenceRegistry, message: &ChatMessage) -> bool {
    let delivered = presence.send_to_user(
        message.receiver_id,
        &ServerEvent::NewMessage {
            data: message.clone(),
        },
    );
    debug!(message_id = %message.id, receiver = %message.receiver_id, delivered, "new message");
    delivered
}

/// `messageEdited` to both participants.
pub fn deliver_edited(presence: &PresenceRegistry, message: &ChatMessage) -> usize {
    let event = ServerEvent::MessageEdited {
        data: message.clone(),
    };
    let delivered = send_to_participants(presence, message, &event);
    debug!(message_id = %message.id, delivered, "message edited");
    delivered
}

/// `newMessage` to both participants, used for system messages such as call logs.
pub fn deliver_to_participants(presence: &PresenceRegistry, message: &ChatMessage) -> usize {
    let event = ServerEvent::NewMessage {
        data: message.clone(),
    };
    send_to_participants(presence, message, &event)
}

fn send_to_participants(presence: &PresenceRegistry, message: &ChatMessage, event: &ServerEvent) -> usize {
    let mut targets: Vec<Uuid> = vec![message.sender_id];
    if message.receiver_id != message.sender_id {
        targets.push(message.receiver_id);
    }
    targets
        .into_iter()
        .filter(|user_id| presence.send_to_user(*user_id, event))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallSystemPayload, CallType, ConnectionId};
    use crate::services::presence::ConnectionHandle;
    use tokio::sync::mpsc;

    fn online(presence: &mut PresenceRegistry, user: Uuid) -> mpsc::UnboundedReceiver<String> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.register(user, ConnectionHandle::new(ConnectionId::generate(), tx));
        while rx.try_recv().is_ok() {}
        rx
    }

    fn message(sender: Uuid, receiver: Uuid) -> ChatMessage {
        ChatMessage::system(sender, receiver, CallSystemPayload::ended_call(CallType::Audio, false))
    }

    #[test]
    fn new_message_goes_to_receiver_only() {
        let mut presence = PresenceRegistry::new();
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let mut sender_rx = online(&mut presence, sender);
        let mut receiver_rx = online(&mut presence, receiver);
        while sender_rx.try_recv().is_ok() {}

        assert!(deliver_new(&presence, &message(sender, receiver)));
        let frame: serde_json::Value = serde_json::from_str(&receiver_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], "newMessage");
        assert!(sender_rx.try_recv().is_err());
    }

    #[test]
    fn edits_reach_both_sides_when_present() {
        let mut presence = PresenceRegistry::new();
        let sender = Uuid::new_v4();
        let mut sender_rx = online(&mut presence, sender);
        let offline = Uuid::new_v4();

        assert_eq!(deliver_edited(&presence, &message(sender, offline)), 1);
        let frame: serde_json::Value = serde_json::from_str(&sender_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], "messageEdited");
    }

    #[test]
    fn absent_receiver_is_not_an_error() {
        let presence = PresenceRegistry::new();
        assert!(!deliver_new(&presence, &message(Uuid::new_v4(), Uuid::new_v4())));
        assert_eq!(deliver_to_participants(&presence, &message(Uuid::new_v4(), Uuid::new_v4())), 0);
    }
}
