use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDate {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub organizer_id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub activity: String,
    pub location: GeoPoint,
    pub scheduled_at: DateTime,
    pub max_participants: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub status: GroupDateStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: ObjectId,
    pub status: ParticipantStatus,
    pub joined_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Accepted,
    Declined,
    Left,
}

impl ParticipantStatus {
    /// Statuses that occupy a seat.
    pub fn holds_seat(self) -> bool {
        matches!(self, ParticipantStatus::Invited | ParticipantStatus::Accepted)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupDateStatus {
    #[default]
    Planning,
    Confirmed,
    Cancelled,
    Completed,
}

impl GroupDateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupDateStatus::Planning => "planning",
            GroupDateStatus::Confirmed => "confirmed",
            GroupDateStatus::Cancelled => "cancelled",
            GroupDateStatus::Completed => "completed",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, GroupDateStatus::Planning | GroupDateStatus::Confirmed)
    }
}

impl GroupDate {
    pub const COLLECTION: &'static str = "group_dates";

    pub fn seated_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.status.holds_seat())
            .count()
    }
}
