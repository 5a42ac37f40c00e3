use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names carried in the `type` field of a frame.
pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const ACK: &str = "ack";
    pub const ERROR: &str = "error";
    pub const HEARTBEAT: &str = "heartbeat";

    pub const JOIN_ROOM: &str = "join_room";
    pub const LEAVE_ROOM: &str = "leave_room";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stop_typing";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const MARK_READ: &str = "mark_read";
    pub const READ_RECEIPT: &str = "read_receipt";
    pub const MESSAGE_READ: &str = "message_read";
    pub const MESSAGE_DELIVERED: &str = "message_delivered";

    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";
    pub const NOTIFICATION: &str = "notification";
}

/// Why an acknowledged emit failed without the server answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFailure {
    NotConnected,
    Timeout,
    ConnectionLost,
}

impl LocalFailure {
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotConnected => "not connected",
            Self::Timeout => "ack timeout",
            Self::ConnectionLost => "connection lost",
        }
    }
}

/// `{ "type": ..., "data": ..., "ack": n? }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            ack: None,
        }
    }

    pub fn with_ack(mut self, ack: u64) -> Self {
        self.ack = Some(ack);
        self
    }

    /// The reply to a frame that asked for acknowledgement.
    pub fn ack_reply(ack: u64, data: Value) -> Self {
        Self::new(events::ACK, data).with_ack(ack)
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Outcome of an acknowledged emit.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub success: bool,
    pub error: Option<String>,
    pub data: Value,
    /// Set when the client gave up locally; `None` for every server reply.
    pub local: Option<LocalFailure>,
}

impl Ack {
    pub fn failed(failure: LocalFailure) -> Self {
        Self {
            success: false,
            error: Some(failure.reason().to_string()),
            data: Value::Null,
            local: Some(failure),
        }
    }

    pub fn from_data(data: Value) -> Self {
        let success = data.get("success").and_then(Value::as_bool).unwrap_or(false);
        let error = data
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| (!success).then(|| "rejected".to_string()));
        Self {
            success,
            error,
            data,
            local: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.local == Some(LocalFailure::Timeout)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(
            self.local,
            Some(LocalFailure::NotConnected | LocalFailure::ConnectionLost)
        )
    }
}

/// A chat message as it travels over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomPayload {
    pub match_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypingPayload {
    pub match_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMessagePayload {
    pub match_id: String,
    pub content: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadPayload {
    pub match_id: String,
    pub reader_id: String,
    pub read_at: DateTime<Utc>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveredPayload {
    pub match_id: String,
    pub message_id: String,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresencePayload {
    pub user_id: String,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}
