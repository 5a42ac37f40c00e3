use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Always two ids, sorted ascending so the pair has one canonical form.
    pub user_ids: Vec<ObjectId>,
    /// `"<low>:<high>"` hex form of `user_ids`; unique per pair.
    pub pair_key: String,
    pub matched_at: DateTime,
    pub last_message_at: Option<DateTime>,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    pub unmatched_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

fn bool_true() -> bool {
    true
}

impl Match {
    pub const COLLECTION: &'static str = "matches";

    pub fn involves(&self, user_id: ObjectId) -> bool {
        self.user_ids.contains(&user_id)
    }

    pub fn other_user(&self, user_id: ObjectId) -> Option<ObjectId> {
        if !self.involves(user_id) {
            return None;
        }
        self.user_ids.iter().copied().find(|id| *id != user_id)
    }
}

pub fn canonical_pair(a: ObjectId, b: ObjectId) -> Vec<ObjectId> {
    if a <= b { vec![a, b] } else { vec![b, a] }
}

pub fn pair_key(a: ObjectId, b: ObjectId) -> String {
    let pair = canonical_pair(a, b);
    format!("{}:{}", pair[0].to_hex(), pair[1].to_hex())
}
