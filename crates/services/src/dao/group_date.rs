use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use kindred_db::models::{GeoPoint, GroupDate, GroupDateStatus, Participant, ParticipantStatus};

use super::base::{BaseDao, DaoError, DaoResult};

#[derive(Debug, Clone)]
pub struct NewGroupDate {
    pub title: String,
    pub description: String,
    pub activity: String,
    pub location: GeoPoint,
    pub scheduled_at: DateTime,
    pub max_participants: u32,
}

pub struct GroupDateDao {
    pub base: BaseDao<GroupDate>,
}

impl GroupDateDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, GroupDate::COLLECTION),
        }
    }

    /// The organizer takes the first seat.
    pub async fn create(&self, organizer_id: ObjectId, new: NewGroupDate) -> DaoResult<GroupDate> {
        if new.max_participants < 2 {
            return Err(DaoError::Validation(
                "A group date needs room for at least 2 participants".to_string(),
            ));
        }
        let now = DateTime::now();
        let group = GroupDate {
            id: None,
            organizer_id,
            title: new.title,
            description: new.description,
            activity: new.activity,
            location: new.location,
            scheduled_at: new.scheduled_at,
            max_participants: new.max_participants,
            participants: vec![Participant {
                user_id: organizer_id,
                status: ParticipantStatus::Accepted,
                joined_at: now,
            }],
            status: GroupDateStatus::Planning,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&group).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_nearby(&self, point: GeoPoint, max_km: f64, limit: i64) -> DaoResult<Vec<GroupDate>> {
        self.base
            .find_limited(
                doc! {
                    "status": { "$in": ["planning", "confirmed"] },
                    "scheduled_at": { "$gte": DateTime::now() },
                    "location": {
                        "$nearSphere": {
                            "$geometry": bson::to_bson(&point)?,
                            "$maxDistance": max_km * 1000.0,
                        }
                    },
                },
                None,
                limit,
            )
            .await
    }

    /// Seats `user_id` as accepted. Seat availability is checked inside the update.
    pub async fn join(&self, group_id: ObjectId, user_id: ObjectId) -> DaoResult<GroupDate> {
        self.seat(group_id, user_id, ParticipantStatus::Accepted).await
    }

    /// Organizer-only: reserves a seat for `invitee_id` in the invited state.
    pub async fn invite(
        &self,
        group_id: ObjectId,
        organizer_id: ObjectId,
        invitee_id: ObjectId,
    ) -> DaoResult<GroupDate> {
        let group = self.base.find_by_id(group_id).await?;
        if group.organizer_id != organizer_id {
            return Err(DaoError::Forbidden("Only the organizer can invite".to_string()));
        }
        self.seat(group_id, invitee_id, ParticipantStatus::Invited).await
    }

    async fn seat(
        &self,
        group_id: ObjectId,
        user_id: ObjectId,
        status: ParticipantStatus,
    ) -> DaoResult<GroupDate> {
        let now = DateTime::now();
        let status_bson = bson::to_bson(&status)?;

        // An invited user accepting keeps the seat they already hold.
        if status == ParticipantStatus::Accepted {
            let accepted = self
                .base
                .update_one(
                    doc! {
                        "_id": group_id,
                        "status": { "$in": ["planning", "confirmed"] },
                        "participants": { "$elemMatch": { "user_id": user_id, "status": "invited" } },
                    },
                    doc! {
                        "$set": {
                            "participants.$.status": "accepted",
                            "participants.$.joined_at": now,
                        }
                    },
                )
                .await?;
            if accepted {
                return self.base.find_by_id(group_id).await;
            }
        }

        let rejoined = self
            .base
            .update_one(
                doc! {
                    "_id": group_id,
                    "status": { "$in": ["planning", "confirmed"] },
                    "participants": {
                        "$elemMatch": { "user_id": user_id, "status": { "$in": ["declined", "left"] } }
                    },
                    "$expr": has_free_seat(),
                },
                doc! {
                    "$set": {
                        "participants.$.status": status_bson,
                        "participants.$.joined_at": now,
                    }
                },
            )
            .await?;

        let seated = rejoined
            || self
                .base
                .update_one(
                    doc! {
                        "_id": group_id,
                        "status": { "$in": ["planning", "confirmed"] },
                        "participants.user_id": { "$ne": user_id },
                        "$expr": has_free_seat(),
                    },
                    doc! {
                        "$push": {
                            "participants": bson::to_bson(&Participant {
                                user_id,
                                status,
                                joined_at: now,
                            })?
                        }
                    },
                )
                .await?;

        let group = self.base.find_by_id(group_id).await?;
        if seated {
            return Ok(group);
        }
        if !group.status.is_open() {
            return Err(DaoError::Validation("Group date is not open".to_string()));
        }
        if group
            .participants
            .iter()
            .any(|p| p.user_id == user_id && p.status.holds_seat())
        {
            return Err(DaoError::Conflict("Already participating".to_string()));
        }
        Err(DaoError::Conflict("Group date is full".to_string()))
    }

    /// Frees the caller's seat. Invited users leaving are recorded as declined.
    pub async fn leave(&self, group_id: ObjectId, user_id: ObjectId) -> DaoResult<GroupDate> {
        let group = self.base.find_by_id(group_id).await?;
        if group.organizer_id == user_id {
            return Err(DaoError::Validation(
                "The organizer cannot leave; cancel the group date instead".to_string(),
            ));
        }
        let current = group
            .participants
            .iter()
            .find(|p| p.user_id == user_id && p.status.holds_seat())
            .ok_or(DaoError::NotFound)?;
        let next = if current.status == ParticipantStatus::Invited { "declined" } else { "left" };

        self.base
            .update_one(
                doc! {
                    "_id": group_id,
                    "participants": {
                        "$elemMatch": { "user_id": user_id, "status": { "$in": ["invited", "accepted"] } }
                    },
                },
                doc! { "$set": { "participants.$.status": next } },
            )
            .await?;
        self.base.find_by_id(group_id).await
    }

    pub async fn update_status(
        &self,
        group_id: ObjectId,
        user_id: ObjectId,
        status: GroupDateStatus,
    ) -> DaoResult<GroupDate> {
        let group = self.base.find_by_id(group_id).await?;
        if group.organizer_id != user_id {
            return Err(DaoError::Forbidden("Only the organizer can change the status".to_string()));
        }
        if !group.status.is_open() {
            return Err(DaoError::Validation(format!(
                "Group date is already {}",
                group.status.as_str()
            )));
        }
        self.base
            .update_by_id(group_id, doc! { "$set": { "status": status.as_str() } })
            .await?;
        self.base.find_by_id(group_id).await
    }

    pub async fn seated_user_ids(&self, group_id: ObjectId) -> DaoResult<Vec<ObjectId>> {
        let group = self.base.find_by_id(group_id).await?;
        Ok(group
            .participants
            .iter()
            .filter(|p| p.status.holds_seat())
            .map(|p| p.user_id)
            .collect())
    }
}

fn has_free_seat() -> Document {
    doc! {
        "$lt": [
            {
                "$size": {
                    "$filter": {
                        "input": "$participants",
                        "cond": { "$in": ["$$this.status", ["invited", "accepted"]] },
                    }
                }
            },
            "$max_participants",
        ]
    }
}
