use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: Option<bson::Document>,
    #[serde(default)]
    pub is_read: bool,
    pub read_at: Option<DateTime>,
    /// Set when the notification was created inside the recipient's quiet hours.
    pub deferred_until: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Match,
    Message,
    Like,
    Event,
    GroupDate,
    ProfileView,
    System,
}

impl Notification {
    pub const COLLECTION: &'static str = "notifications";
}
