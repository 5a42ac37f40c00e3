use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use kindred_db::models::{BetaBug, BetaFeedback, BetaSession, BugSeverity, BugStatus};
use serde::Serialize;

use super::base::{BaseDao, DaoError, DaoResult};

#[derive(Debug, Clone, Serialize, Default)]
pub struct BetaStats {
    pub feedback_by_category: Vec<CategoryRating>,
    pub bugs_by_severity: Vec<Bucket>,
    pub bugs_by_status: Vec<Bucket>,
    pub sessions: SessionStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRating {
    pub category: String,
    pub count: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SessionStats {
    pub total: i64,
    pub completed: i64,
    pub average_duration_secs: f64,
}

pub struct BetaDao {
    pub feedback: BaseDao<BetaFeedback>,
    pub bugs: BaseDao<BetaBug>,
    pub sessions: BaseDao<BetaSession>,
}

impl BetaDao {
    pub fn new(db: &Database) -> Self {
        Self {
            feedback: BaseDao::new(db, BetaFeedback::COLLECTION),
            bugs: BaseDao::new(db, BetaBug::COLLECTION),
            sessions: BaseDao::new(db, BetaSession::COLLECTION),
        }
    }

    pub async fn submit_feedback(
        &self,
        user_id: ObjectId,
        category: String,
        rating: u8,
        message: String,
        screen: Option<String>,
        app_version: Option<String>,
    ) -> DaoResult<BetaFeedback> {
        if !(1..=5).contains(&rating) {
            return Err(DaoError::Validation("rating must be between 1 and 5".to_string()));
        }
        let feedback = BetaFeedback {
            id: None,
            user_id,
            category,
            rating,
            message,
            screen,
            app_version,
            created_at: DateTime::now(),
        };
        let id = self.feedback.insert_one(&feedback).await?;
        self.feedback.find_by_id(id).await
    }

    pub async fn report_bug(
        &self,
        user_id: ObjectId,
        title: String,
        description: String,
        severity: BugSeverity,
        steps_to_reproduce: Vec<String>,
        device_info: Option<String>,
    ) -> DaoResult<BetaBug> {
        let now = DateTime::now();
        let bug = BetaBug {
            id: None,
            user_id,
            title,
            description,
            severity,
            status: BugStatus::Open,
            steps_to_reproduce,
            device_info,
            created_at: now,
            updated_at: now,
        };
        let id = self.bugs.insert_one(&bug).await?;
        self.bugs.find_by_id(id).await
    }

    pub async fn update_bug_status(&self, bug_id: ObjectId, status: BugStatus) -> DaoResult<BetaBug> {
        self.bugs.find_by_id(bug_id).await?;
        self.bugs
            .update_by_id(bug_id, doc! { "$set": { "status": status.as_str() } })
            .await?;
        self.bugs.find_by_id(bug_id).await
    }

    pub async fn start_session(
        &self,
        user_id: ObjectId,
        device: Option<String>,
        app_version: Option<String>,
    ) -> DaoResult<BetaSession> {
        let session = BetaSession {
            id: None,
            user_id,
            started_at: DateTime::now(),
            ended_at: None,
            duration_secs: None,
            screens_visited: Vec::new(),
            device,
            app_version,
        };
        let id = self.sessions.insert_one(&session).await?;
        self.sessions.find_by_id(id).await
    }

    /// Closes an open session owned by `user_id`, recording its duration.
    pub async fn end_session(
        &self,
        session_id: ObjectId,
        user_id: ObjectId,
        screens_visited: Vec<String>,
    ) -> DaoResult<BetaSession> {
        let session = self.sessions.find_by_id(session_id).await?;
        if session.user_id != user_id {
            return Err(DaoError::Forbidden("Not your session".to_string()));
        }
        if session.ended_at.is_some() {
            return Err(DaoError::Conflict("Session already ended".to_string()));
        }
        let now = DateTime::now();
        let duration_secs =
            (now.timestamp_millis() - session.started_at.timestamp_millis()).max(0) / 1000;
        self.sessions
            .update_raw(
                doc! { "_id": session_id, "ended_at": null },
                doc! {
                    "$set": {
                        "ended_at": now,
                        "duration_secs": duration_secs,
                        "screens_visited": screens_visited,
                    }
                },
            )
            .await?;
        self.sessions.find_by_id(session_id).await
    }

    pub async fn stats(&self) -> DaoResult<BetaStats> {
        let feedback_by_category = self
            .feedback
            .aggregate(vec![
                doc! { "$group": {
                    "_id": "$category",
                    "count": { "$sum": 1 },
                    "average_rating": { "$avg": "$rating" },
                } },
                doc! { "$sort": { "count": -1 } },
            ])
            .await?
            .iter()
            .map(|d| CategoryRating {
                category: d.get_str("_id").unwrap_or("uncategorized").to_string(),
                count: number(d, "count") as i64,
                average_rating: number(d, "average_rating"),
            })
            .collect();

        let bugs_by_severity = self.bucket_bugs("$severity").await?;
        let bugs_by_status = self.bucket_bugs("$status").await?;

        let sessions = self
            .sessions
            .aggregate(vec![doc! { "$group": {
                "_id": null,
                "total": { "$sum": 1 },
                "completed": { "$sum": { "$cond": [{ "$ifNull": ["$ended_at", false] }, 1, 0] } },
                "average_duration_secs": { "$avg": "$duration_secs" },
            } }])
            .await?
            .first()
            .map(|d| SessionStats {
                total: number(d, "total") as i64,
                completed: number(d, "completed") as i64,
                average_duration_secs: number(d, "average_duration_secs"),
            })
            .unwrap_or_default();

        Ok(BetaStats {
            feedback_by_category,
            bugs_by_severity,
            bugs_by_status,
            sessions,
        })
    }

    async fn bucket_bugs(&self, field: &str) -> DaoResult<Vec<Bucket>> {
        Ok(self
            .bugs
            .aggregate(vec![
                doc! { "$group": { "_id": field, "count": { "$sum": 1 } } },
                doc! { "$sort": { "count": -1 } },
            ])
            .await?
            .iter()
            .map(|d| Bucket {
                key: d.get_str("_id").unwrap_or("unknown").to_string(),
                count: number(d, "count") as i64,
            })
            .collect())
    }
}

/// Aggregation numbers come back as Int32, Int64 or Double depending on input.
fn number(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(bson::Bson::Int32(v)) => f64::from(*v),
        Some(bson::Bson::Int64(v)) => *v as f64,
        Some(bson::Bson::Double(v)) => *v,
        _ => 0.0,
    }
}
