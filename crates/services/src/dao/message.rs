use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use kindred_db::models::{Message, MessageType};

use super::base::{BaseDao, DaoResult, PaginatedResult, PaginationParams};

pub struct MessageDao {
    pub base: BaseDao<Message>,
}

impl MessageDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Message::COLLECTION),
        }
    }

    /// Stores a message. A repeated `client_id` from the same sender returns the
    /// already-stored message instead of creating a duplicate.
    pub async fn create(
        &self,
        match_id: ObjectId,
        sender_id: ObjectId,
        content: String,
        message_type: MessageType,
        client_id: Option<String>,
    ) -> DaoResult<Message> {
        if let Some(ref cid) = client_id {
            let existing = self
                .base
                .find_one(doc! { "match_id": match_id, "sender_id": sender_id, "client_id": cid })
                .await?;
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }

        let message = Message {
            id: None,
            match_id,
            sender_id,
            content,
            message_type,
            client_id,
            delivered_at: None,
            read_at: None,
            created_at: DateTime::now(),
        };

        let id = self.base.insert_one(&message).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_in_match(
        &self,
        match_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Message>> {
        self.base
            .find_paginated(
                doc! { "match_id": match_id },
                Some(doc! { "created_at": -1 }),
                params,
            )
            .await
    }

    /// Marks everything the other participant sent as read; returns how many changed.
    pub async fn mark_read(&self, match_id: ObjectId, reader_id: ObjectId) -> DaoResult<u64> {
        self.base
            .update_many_raw(
                doc! {
                    "match_id": match_id,
                    "sender_id": { "$ne": reader_id },
                    "read_at": null,
                },
                doc! { "$set": { "read_at": DateTime::now() } },
            )
            .await
    }

    pub async fn mark_delivered(
        &self,
        match_id: ObjectId,
        message_id: ObjectId,
        recipient_id: ObjectId,
    ) -> DaoResult<Option<Message>> {
        self.base
            .update_raw(
                doc! {
                    "_id": message_id,
                    "match_id": match_id,
                    "sender_id": { "$ne": recipient_id },
                    "delivered_at": null,
                },
                doc! { "$set": { "delivered_at": DateTime::now() } },
            )
            .await?;
        self.base
            .find_one(doc! { "_id": message_id, "match_id": match_id })
            .await
    }

    pub async fn unread_count(&self, match_id: ObjectId, reader_id: ObjectId) -> DaoResult<u64> {
        self.base
            .count(doc! {
                "match_id": match_id,
                "sender_id": { "$ne": reader_id },
                "read_at": null,
            })
            .await
    }

    pub async fn last_in_match(&self, match_id: ObjectId) -> DaoResult<Option<Message>> {
        let mut last = self
            .base
            .find_limited(doc! { "match_id": match_id }, Some(doc! { "created_at": -1 }), 1)
            .await?;
        Ok(last.pop())
    }
}
