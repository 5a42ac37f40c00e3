use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use kindred_db::models::{Gender, GeoPoint, NotificationPrefs, ProfileView, User};

use super::base::{BaseDao, DaoError, DaoResult};

const VIEW_DEDUP_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
const MAX_VIEW_HISTORY: i32 = 200;

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub photos: Option<Vec<String>>,
    pub gender: Option<Gender>,
    pub interested_in: Option<Vec<Gender>>,
}

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        email: String,
        display_name: String,
        password_hash: String,
        birth_date: DateTime,
        gender: Gender,
        interested_in: Vec<Gender>,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email,
            display_name,
            password_hash: Some(password_hash),
            birth_date,
            gender,
            interested_in,
            bio: String::new(),
            interests: Vec::new(),
            photos: Vec::new(),
            location: None,
            is_online: false,
            last_active: None,
            profile_viewed_by: Vec::new(),
            notification_preferences: NotificationPrefs::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": email, "deleted_at": null })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_active(&self, user_id: ObjectId) -> DaoResult<User> {
        self.base
            .find_one(doc! { "_id": user_id, "deleted_at": null })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn update_profile(&self, user_id: ObjectId, update: ProfileUpdate) -> DaoResult<bool> {
        let mut set_doc = doc! {};
        if let Some(name) = update.display_name {
            set_doc.insert("display_name", name);
        }
        if let Some(bio) = update.bio {
            set_doc.insert("bio", bio);
        }
        if let Some(interests) = update.interests {
            set_doc.insert("interests", interests);
        }
        if let Some(photos) = update.photos {
            set_doc.insert("photos", photos);
        }
        if let Some(gender) = update.gender {
            set_doc.insert("gender", bson::to_bson(&gender)?);
        }
        if let Some(interested_in) = update.interested_in {
            set_doc.insert("interested_in", bson::to_bson(&interested_in)?);
        }

        if set_doc.is_empty() {
            return Ok(false);
        }

        self.base
            .update_one(doc! { "_id": user_id, "deleted_at": null }, doc! { "$set": set_doc })
            .await
    }

    pub async fn update_location(&self, user_id: ObjectId, location: GeoPoint) -> DaoResult<bool> {
        self.base
            .update_by_id(user_id, doc! { "$set": { "location": bson::to_bson(&location)? } })
            .await
    }

    pub async fn set_online(&self, user_id: ObjectId, online: bool) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! { "$set": { "is_online": online, "last_active": DateTime::now() } },
            )
            .await
    }

    pub async fn touch_activity(&self, user_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_raw(
                doc! { "_id": user_id },
                doc! { "$set": { "last_active": DateTime::now() } },
            )
            .await
    }

    /// Flags users offline when they have been silent since `cutoff`.
    pub async fn mark_stale_offline(&self, cutoff: DateTime) -> DaoResult<u64> {
        self.base
            .update_many_raw(
                doc! { "is_online": true, "last_active": { "$lt": cutoff } },
                doc! { "$set": { "is_online": false } },
            )
            .await
    }

    /// Appends a view unless the same viewer was recorded within the last 24h.
    /// Returns whether a new view was stored.
    pub async fn record_profile_view(
        &self,
        owner_id: ObjectId,
        viewer_id: ObjectId,
    ) -> DaoResult<bool> {
        if owner_id == viewer_id {
            return Ok(false);
        }
        let now = DateTime::now();
        let window_start = DateTime::from_millis(now.timestamp_millis() - VIEW_DEDUP_WINDOW_MS);
        let view = ProfileView {
            viewer_id,
            viewed_at: now,
        };

        self.base
            .update_raw(
                doc! {
                    "_id": owner_id,
                    "deleted_at": null,
                    "profile_viewed_by": {
                        "$not": {
                            "$elemMatch": {
                                "viewer_id": viewer_id,
                                "viewed_at": { "$gte": window_start },
                            }
                        }
                    },
                },
                doc! {
                    "$push": {
                        "profile_viewed_by": {
                            "$each": [bson::to_bson(&view)?],
                            "$slice": -MAX_VIEW_HISTORY,
                        }
                    }
                },
            )
            .await
    }

    pub async fn recent_viewers(&self, owner_id: ObjectId) -> DaoResult<Vec<ProfileView>> {
        let user = self.find_active(owner_id).await?;
        let mut views = user.profile_viewed_by;
        views.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
        Ok(views)
    }

    pub async fn update_notification_prefs(
        &self,
        user_id: ObjectId,
        prefs: &NotificationPrefs,
    ) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! { "$set": { "notification_preferences": bson::to_bson(prefs)? } },
            )
            .await
    }

    /// Users near `point`, nearest first, excluding `user_id` itself.
    pub async fn find_nearby(
        &self,
        user_id: ObjectId,
        point: GeoPoint,
        max_km: f64,
        limit: i64,
    ) -> DaoResult<Vec<User>> {
        self.base
            .find_limited(
                doc! {
                    "_id": { "$ne": user_id },
                    "deleted_at": null,
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
}
