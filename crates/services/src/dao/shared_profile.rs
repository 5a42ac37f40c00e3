use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use mongodb::options::ReturnDocument;
use kindred_db::models::{SharedProfile, ShareView};

use super::base::{BaseDao, DaoError, DaoResult};

const TOKEN_LEN: usize = 21;
const MAX_VIEW_HISTORY: i32 = 100;

pub struct SharedProfileDao {
    pub base: BaseDao<SharedProfile>,
}

impl SharedProfileDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, SharedProfile::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        user_id: ObjectId,
        shared_by: ObjectId,
        ttl_hours: u32,
        note: Option<String>,
    ) -> DaoResult<SharedProfile> {
        let now = DateTime::now();
        let expires_at =
            DateTime::from_millis(now.timestamp_millis() + i64::from(ttl_hours) * 60 * 60 * 1000);
        let share = SharedProfile {
            id: None,
            token: nanoid::nanoid!(TOKEN_LEN),
            user_id,
            shared_by,
            note,
            expires_at,
            view_count: 0,
            view_history: Vec::new(),
            is_active: true,
            created_at: now,
        };

        let id = self.base.insert_one(&share).await?;
        self.base.find_by_id(id).await
    }

    /// Counts a view of a live share. Revoked or expired tokens are not found,
    /// even before the TTL monitor removes the document.
    pub async fn record_view(
        &self,
        token: &str,
        viewer_id: Option<ObjectId>,
    ) -> DaoResult<SharedProfile> {
        let now = DateTime::now();
        let view = ShareView {
            viewer_id,
            viewed_at: now,
        };
        self.base
            .collection()
            .find_one_and_update(
                doc! { "token": token, "is_active": true, "expires_at": { "$gt": now } },
                doc! {
                    "$inc": { "view_count": 1 },
                    "$push": {
                        "view_history": {
                            "$each": [bson::to_bson(&view)?],
                            "$slice": -MAX_VIEW_HISTORY,
                        }
                    },
                },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn revoke(&self, token: &str, user_id: ObjectId) -> DaoResult<()> {
        let share = self
            .base
            .find_one(doc! { "token": token })
            .await?
            .ok_or(DaoError::NotFound)?;
        if share.shared_by != user_id && share.user_id != user_id {
            return Err(DaoError::Forbidden("Not your share link".to_string()));
        }
        self.base
            .update_raw(doc! { "token": token }, doc! { "$set": { "is_active": false } })
            .await?;
        Ok(())
    }

    pub async fn list_by_sharer(&self, shared_by: ObjectId) -> DaoResult<Vec<SharedProfile>> {
        self.base
            .find_many(
                doc! { "shared_by": shared_by, "is_active": true, "expires_at": { "$gt": DateTime::now() } },
                Some(doc! { "created_at": -1 }),
            )
            .await
    }
}
