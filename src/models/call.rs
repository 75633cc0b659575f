//! Call types, unordered pair keys, and the call-log system payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Media kind negotiated for a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Audio,
    /// Clients that omit `callType` get a video call.
    #[default]
    Video,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Audio => "audio",
            CallType::Video => "video",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-independent key for two participants: `(a, b)` and `(b, a)` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(Uuid, Uuid);

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.0 == user_id || self.1 == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is part of the pair.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if self.0 == user_id {
            Some(self.1)
        } else if self.1 == user_id {
            Some(self.0)
        } else {
            None
        }
    }

    pub fn low(&self) -> Uuid {
        self.0
    }

    pub fn high(&self) -> Uuid {
        self.1
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// Call direction from the perspective of the message sender. Call logs are always
/// written by the party that ended the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Outgoing,
}

/// Structured content of a call-log system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSystemPayload {
    /// Always `"call"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub call_type: CallType,
    pub duration_sec: u32,
    pub direction: CallDirection,
    pub accepted: bool,
}

impl CallSystemPayload {
    /// Summary of a call ended by the sender. Talk time is not tracked, so duration is 0.
    pub fn ended_call(call_type: CallType, accepted: bool) -> Self {
        Self {
            kind: "call".to_string(),
            call_type,
            duration_sec: 0,
            direction: CallDirection::Outgoing,
            accepted,
        }
    }
}
