use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedProfile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_id: ObjectId,
    pub shared_by: ObjectId,
    pub note: Option<String>,
    /// Backed by a TTL index, so expired shares disappear on their own.
    pub expires_at: DateTime,
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub view_history: Vec<ShareView>,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareView {
    pub viewer_id: Option<ObjectId>,
    pub viewed_at: DateTime,
}

fn bool_true() -> bool {
    true
}

impl SharedProfile {
    pub const COLLECTION: &'static str = "shared_profiles";
}
