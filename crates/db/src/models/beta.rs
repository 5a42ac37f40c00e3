use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaFeedback {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub category: String,
    pub rating: u8,
    pub message: String,
    pub screen: Option<String>,
    pub app_version: Option<String>,
    pub created_at: DateTime,
}

impl BetaFeedback {
    pub const COLLECTION: &'static str = "beta_feedback";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaBug {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: BugSeverity,
    #[serde(default)]
    pub status: BugStatus,
    #[serde(default)]
    pub steps_to_reproduce: Vec<String>,
    pub device_info: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BugSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    #[default]
    Open,
    Triaged,
    Fixed,
    Closed,
}

impl BugStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BugStatus::Open => "open",
            BugStatus::Triaged => "triaged",
            BugStatus::Fixed => "fixed",
            BugStatus::Closed => "closed",
        }
    }
}

impl BetaBug {
    pub const COLLECTION: &'static str = "beta_bugs";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaSession {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub started_at: DateTime,
    pub ended_at: Option<DateTime>,
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub screens_visited: Vec<String>,
    pub device: Option<String>,
    pub app_version: Option<String>,
}

impl BetaSession {
    pub const COLLECTION: &'static str = "beta_sessions";
}
