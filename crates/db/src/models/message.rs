use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub match_id: ObjectId,
    pub sender_id: ObjectId,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub client_id: Option<String>,
    pub delivered_at: Option<DateTime>,
    pub read_at: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Icebreaker,
    System,
}

impl Message {
    pub const COLLECTION: &'static str = "messages";
}
