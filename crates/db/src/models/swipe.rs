use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swipe {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub swiper_id: ObjectId,
    pub target_id: ObjectId,
    pub action: SwipeAction,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwipeAction {
    Like,
    SuperLike,
    Pass,
}

impl SwipeAction {
    pub fn is_positive(self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::SuperLike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::SuperLike => "super_like",
            SwipeAction::Pass => "pass",
        }
    }
}

impl Swipe {
    pub const COLLECTION: &'static str = "swipes";
}
