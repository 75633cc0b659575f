//! WebSocket wire events. Every frame is `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::call::CallType;
use super::message::ChatMessage;

/// Message sent by a client over its WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    #[serde(rename = "typing")]
    Typing { data: TypingPayload },
    #[serde(rename = "stopTyping")]
    StopTyping { data: TypingPayload },
    #[serde(rename = "call:offer")]
    CallOffer { data: OfferPayload },
    #[serde(rename = "call:answer")]
    CallAnswer { data: AnswerPayload },
    #[serde(rename = "call:ice-candidate")]
    CallIceCandidate { data: IceCandidatePayload },
    #[serde(rename = "call:end")]
    CallEnd { data: EndPayload },
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub receiver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub to: Uuid,
    /// Opaque SDP offer, forwarded untouched.
    pub offer: serde_json::Value,
    /// Caller profile shown on the callee's ringing screen.
    #[serde(default)]
    pub caller: serde_json::Value,
    #[serde(default)]
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub to: Uuid,
    pub answer: serde_json::Value,
    #[serde(default)]
    pub callee: serde_json::Value,
    #[serde(default)]
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    pub to: Uuid,
    pub candidate: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPayload {
    pub to: Uuid,
    #[serde(default)]
    pub call_type: CallType,
}

/// Message pushed by the relay to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    #[serde(rename = "connection_established")]
    ConnectionEstablished { data: ConnectionEstablished },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers { data: Vec<Uuid> },
    #[serde(rename = "users:busy")]
    BusyUsers { data: Vec<Uuid> },
    #[serde(rename = "typing")]
    Typing { data: TypingNotice },
    #[serde(rename = "stopTyping")]
    StopTyping { data: TypingNotice },
    #[serde(rename = "call:incoming")]
    CallIncoming { data: IncomingCall },
    #[serde(rename = "call:unavailable")]
    CallUnavailable { data: CallRejection },
    #[serde(rename = "call:busy")]
    CallBusy { data: CallRejection },
    #[serde(rename = "call:answer")]
    CallAnswer { data: AnsweredCall },
    #[serde(rename = "call:ice-candidate")]
    CallIceCandidate { data: RelayedCandidate },
    #[serde(rename = "call:ended")]
    CallEnded { data: EndedCall },
    #[serde(rename = "newMessage")]
    NewMessage { data: ChatMessage },
    #[serde(rename = "messageEdited")]
    MessageEdited { data: ChatMessage },
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionEstablished { .. } => "connection_established",
            ServerEvent::Pong => "pong",
            ServerEvent::OnlineUsers { .. } => "getOnlineUsers",
            ServerEvent::BusyUsers { .. } => "users:busy",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::StopTyping { .. } => "stopTyping",
            ServerEvent::CallIncoming { .. } => "call:incoming",
            ServerEvent::CallUnavailable { .. } => "call:unavailable",
            ServerEvent::CallBusy { .. } => "call:busy",
            ServerEvent::CallAnswer { .. } => "call:answer",
            ServerEvent::CallIceCandidate { .. } => "call:ice-candidate",
            ServerEvent::CallEnded { .. } => "call:ended",
            ServerEvent::NewMessage { .. } => "newMessage",
            ServerEvent::MessageEdited { .. } => "messageEdited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    pub socket_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub sender_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingCall {
    pub from: Uuid,
    pub offer: serde_json::Value,
    pub caller: serde_json::Value,
    #[serde(rename = "type")]
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRejection {
    pub to: Uuid,
    #[serde(rename = "type")]
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredCall {
    pub from: Uuid,
    pub answer: serde_json::Value,
    pub callee: serde_json::Value,
    #[serde(rename = "type")]
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedCandidate {
    pub from: Uuid,
    pub candidate: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndedCall {
    pub from: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_offer_with_default_call_type() {
        let to = Uuid::new_v4();
        let raw = json!({
            "event": "call:offer",
            "data": { "to": to, "offer": { "sdp": "v=0" }, "caller": { "fullName": "A" } }
        });
        match serde_json::from_value::<ClientEvent>(raw).unwrap() {
            ClientEvent::CallOffer { data } => {
                assert_eq!(data.to, to);
                assert_eq!(data.call_type, CallType::Video);
                assert_eq!(data.offer["sdp"], "v=0");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn parses_typing_and_ping() {
        let receiver = Uuid::new_v4();
        let raw = json!({ "event": "stopTyping", "data": { "receiverId": receiver } });
        assert!(matches!(
            serde_json::from_value::<ClientEvent>(raw).unwrap(),
            ClientEvent::StopTyping { data } if data.receiver_id == receiver
        ));
        let ping: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientEvent::Ping));
    }

    #[test]
    fn rejects_non_uuid_target() {
        let raw = json!({ "event": "call:end", "data": { "to": "not-a-user" } });
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn server_event_wire_names() {
        let from = Uuid::new_v4();
        let event = ServerEvent::CallIncoming {
            data: IncomingCall {
                from,
                offer: json!({}),
                caller: json!(null),
                call_type: CallType::Audio,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["type"], "audio");
        assert_eq!(value["data"]["from"], json!(from));

        let busy = serde_json::to_value(ServerEvent::BusyUsers { data: vec![from] }).unwrap();
        assert_eq!(busy, json!({ "event": "users:busy", "data": [from] }));
    }
}
