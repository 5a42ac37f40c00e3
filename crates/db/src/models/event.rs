use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub organizer_id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: EventCategory,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub start_time: DateTime,
    pub end_time: Option<DateTime>,
    pub max_attendees: u32,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default = "bool_true")]
    pub is_public: bool,
    #[serde(default)]
    pub status: EventStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub user_id: ObjectId,
    pub status: AttendeeStatus,
    pub registered_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeStatus {
    Going,
    Interested,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    #[default]
    Social,
    Speed,
    Outdoor,
    Food,
    Music,
    Sports,
    Arts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

fn bool_true() -> bool {
    true
}

impl Event {
    pub const COLLECTION: &'static str = "events";

    pub fn active_attendee_count(&self) -> usize {
        self.attendees
            .iter()
            .filter(|a| a.status != AttendeeStatus::Cancelled)
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.active_attendee_count() >= self.max_attendees as usize
    }
}
