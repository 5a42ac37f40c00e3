use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use kindred_db::models::{Notification, NotificationType};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct NotificationDao {
    pub base: BaseDao<Notification>,
}

impl NotificationDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Notification::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        user_id: ObjectId,
        notification_type: NotificationType,
        title: String,
        body: String,
        data: Option<Document>,
        deferred_until: Option<DateTime>,
    ) -> DaoResult<Notification> {
        let notification = Notification {
            id: None,
            user_id,
            notification_type,
            title,
            body,
            data,
            is_read: false,
            read_at: None,
            deferred_until,
            created_at: DateTime::now(),
        };

        let id = self.base.insert_one(&notification).await?;
        self.base.find_by_id(id).await
    }

    /// Notifications still held back by quiet hours are not visible yet.
    fn visible_filter(user_id: ObjectId, now: DateTime) -> Document {
        doc! {
            "user_id": user_id,
            "$or": [
                { "deferred_until": null },
                { "deferred_until": { "$lte": now } },
            ],
        }
    }

    pub async fn list_for_user(
        &self,
        user_id: ObjectId,
        unread_only: bool,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Notification>> {
        let mut filter = Self::visible_filter(user_id, DateTime::now());
        if unread_only {
            filter.insert("is_read", false);
        }
        self.base
            .find_paginated(filter, Some(doc! { "created_at": -1 }), params)
            .await
    }

    pub async fn unread_count(&self, user_id: ObjectId) -> DaoResult<u64> {
        let mut filter = Self::visible_filter(user_id, DateTime::now());
        filter.insert("is_read", false);
        self.base.count(filter).await
    }

    pub async fn mark_read(&self, user_id: ObjectId, notification_id: ObjectId) -> DaoResult<()> {
        let found = self
            .base
            .count(doc! { "_id": notification_id, "user_id": user_id })
            .await?;
        if found == 0 {
            return Err(DaoError::NotFound);
        }
        self.base
            .update_raw(
                doc! { "_id": notification_id, "user_id": user_id, "is_read": false },
                doc! { "$set": { "is_read": true, "read_at": DateTime::now() } },
            )
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: ObjectId) -> DaoResult<u64> {
        self.base
            .update_many_raw(
                doc! { "user_id": user_id, "is_read": false },
                doc! { "$set": { "is_read": true, "read_at": DateTime::now() } },
            )
            .await
    }

    pub async fn delete(&self, user_id: ObjectId, notification_id: ObjectId) -> DaoResult<()> {
        let deleted = self
            .base
            .hard_delete(doc! { "_id": notification_id, "user_id": user_id })
            .await?;
        if deleted == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    /// Deferred notifications whose quiet window has closed.
    pub async fn find_due(&self, now: DateTime, limit: i64) -> DaoResult<Vec<Notification>> {
        self.base
            .find_limited(
                doc! { "deferred_until": { "$ne": null, "$lte": now } },
                Some(doc! { "deferred_until": 1 }),
                limit,
            )
            .await
    }

    pub async fn clear_deferral(&self, notification_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_raw(
                doc! { "_id": notification_id },
                doc! { "$set": { "deferred_until": null } },
            )
            .await
    }
}
