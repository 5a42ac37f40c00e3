use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use kindred_db::models::{Attendee, AttendeeStatus, Event, EventCategory, EventStatus, GeoPoint};
use tracing::debug;

use super::base::{BaseDao, DaoError, DaoResult};

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub start_time: DateTime,
    pub end_time: Option<DateTime>,
    pub max_attendees: u32,
    pub is_public: bool,
}

pub struct EventDao {
    pub base: BaseDao<Event>,
}

impl EventDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Event::COLLECTION),
        }
    }

    pub async fn create(&self, organizer_id: ObjectId, new: NewEvent) -> DaoResult<Event> {
        if new.max_attendees == 0 {
            return Err(DaoError::Validation("max_attendees must be at least 1".to_string()));
        }
        if let Some(end) = new.end_time {
            if end <= new.start_time {
                return Err(DaoError::Validation("end_time must be after start_time".to_string()));
            }
        }

        let now = DateTime::now();
        let event = Event {
            id: None,
            organizer_id,
            title: new.title,
            description: new.description,
            category: new.category,
            location: new.location,
            address: new.address,
            start_time: new.start_time,
            end_time: new.end_time,
            max_attendees: new.max_attendees,
            attendees: Vec::new(),
            is_public: new.is_public,
            status: EventStatus::Upcoming,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&event).await?;
        self.base.find_by_id(id).await
    }

    /// Upcoming public events near `point`, nearest first.
    pub async fn find_nearby(
        &self,
        point: GeoPoint,
        max_km: f64,
        category: Option<EventCategory>,
        limit: i64,
    ) -> DaoResult<Vec<Event>> {
        let mut filter = doc! {
            "is_public": true,
            "status": "upcoming",
            "start_time": { "$gte": DateTime::now() },
            "location": {
                "$nearSphere": {
                    "$geometry": bson::to_bson(&point)?,
                    "$maxDistance": max_km * 1000.0,
                }
            },
        };
        if let Some(category) = category {
            filter.insert("category", bson::to_bson(&category)?);
        }
        self.base.find_limited(filter, None, limit).await
    }

    /// Registers `user_id`. The capacity check and the insert are one
    /// conditional update, so concurrent registrations cannot overfill the event.
    pub async fn register(
        &self,
        event_id: ObjectId,
        user_id: ObjectId,
        status: AttendeeStatus,
    ) -> DaoResult<Event> {
        if status == AttendeeStatus::Cancelled {
            return Err(DaoError::Validation("Cannot register as cancelled".to_string()));
        }
        let now = DateTime::now();
        let status_bson = bson::to_bson(&status)?;

        // Re-activate an earlier cancelled registration in place.
        let reactivated = self
            .base
            .update_one(
                doc! {
                    "_id": event_id,
                    "status": "upcoming",
                    "attendees": { "$elemMatch": { "user_id": user_id, "status": "cancelled" } },
                    "$expr": has_free_seat(),
                },
                doc! {
                    "$set": {
                        "attendees.$.status": status_bson.clone(),
                        "attendees.$.registered_at": now,
                    }
                },
            )
            .await?;

        let registered = reactivated
            || self
                .base
                .update_one(
                    doc! {
                        "_id": event_id,
                        "status": "upcoming",
                        "attendees.user_id": { "$ne": user_id },
                        "$expr": has_free_seat(),
                    },
                    doc! {
                        "$push": {
                            "attendees": bson::to_bson(&Attendee {
                                user_id,
                                status,
                                registered_at: now,
                            })?
                        }
                    },
                )
                .await?;

        let event = self.base.find_by_id(event_id).await?;
        if registered {
            debug!(?event_id, ?user_id, "Event registration");
            return Ok(event);
        }

        if event.status != EventStatus::Upcoming {
            return Err(DaoError::Validation("Event is not open for registration".to_string()));
        }
        if event
            .attendees
            .iter()
            .any(|a| a.user_id == user_id && a.status != AttendeeStatus::Cancelled)
        {
            return Err(DaoError::Conflict("Already registered".to_string()));
        }
        Err(DaoError::Conflict("Event is full".to_string()))
    }

    pub async fn cancel_registration(&self, event_id: ObjectId, user_id: ObjectId) -> DaoResult<Event> {
        let changed = self
            .base
            .update_one(
                doc! {
                    "_id": event_id,
                    "attendees": {
                        "$elemMatch": { "user_id": user_id, "status": { "$ne": "cancelled" } }
                    },
                },
                doc! { "$set": { "attendees.$.status": "cancelled" } },
            )
            .await?;
        if !changed {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(event_id).await
    }

    pub async fn delete(&self, event_id: ObjectId, user_id: ObjectId) -> DaoResult<()> {
        let event = self.base.find_by_id(event_id).await?;
        if event.organizer_id != user_id {
            return Err(DaoError::Forbidden("Only the organizer can delete this event".to_string()));
        }
        self.base.hard_delete(doc! { "_id": event_id }).await?;
        Ok(())
    }
}

/// `$expr` clause: active (non-cancelled) attendees are below `max_attendees`.
fn has_free_seat() -> Document {
    doc! {
        "$lt": [
            {
                "$size": {
                    "$filter": {
                        "input": "$attendees",
                        "cond": { "$ne": ["$$this.status", "cancelled"] },
                    }
                }
            },
            "$max_attendees",
        ]
    }
}
