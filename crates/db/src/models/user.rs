use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub birth_date: DateTime,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub interested_in: Vec<Gender>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub is_online: bool,
    pub last_active: Option<DateTime>,
    #[serde(default)]
    pub profile_viewed_by: Vec<ProfileView>,
    #[serde(default)]
    pub notification_preferences: NotificationPrefs,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub deleted_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Woman,
    Man,
    NonBinary,
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub viewer_id: ObjectId,
    pub viewed_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPrefs {
    #[serde(default = "bool_true")]
    pub new_matches: bool,
    #[serde(default = "bool_true")]
    pub messages: bool,
    #[serde(default = "bool_true")]
    pub likes: bool,
    #[serde(default = "bool_true")]
    pub events: bool,
    #[serde(default = "bool_true")]
    pub profile_views: bool,
    #[serde(default = "bool_true")]
    pub push: bool,
    #[serde(default)]
    pub quiet_hours: QuietHoursPrefs,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            new_matches: true,
            messages: true,
            likes: true,
            events: true,
            profile_views: true,
            push: true,
            quiet_hours: QuietHoursPrefs::default(),
        }
    }
}

/// Local-time window stored as `HH:MM` strings plus the user's UTC offset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuietHoursPrefs {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_quiet_start")]
    pub start: String,
    #[serde(default = "default_quiet_end")]
    pub end: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for QuietHoursPrefs {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_quiet_start(),
            end: default_quiet_end(),
            utc_offset_minutes: 0,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_quiet_start() -> String {
    "22:00".to_string()
}

fn default_quiet_end() -> String {
    "08:00".to_string()
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
