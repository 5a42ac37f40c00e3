use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use mongodb::options::ReturnDocument;
use kindred_db::models::{canonical_pair, pair_key, Match, Swipe, SwipeAction};
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

#[derive(Debug)]
pub struct SwipeOutcome {
    pub action: SwipeAction,
    /// Set when this swipe completed a mutual like.
    pub new_match: Option<Match>,
}

pub struct MatchDao {
    pub base: BaseDao<Match>,
    pub swipes: BaseDao<Swipe>,
}

impl MatchDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Match::COLLECTION),
            swipes: BaseDao::new(db, Swipe::COLLECTION),
        }
    }

    /// Records (or overwrites) a swipe; a positive swipe that meets a positive
    /// swipe from the target creates the match exactly once.
    pub async fn swipe(
        &self,
        swiper_id: ObjectId,
        target_id: ObjectId,
        action: SwipeAction,
    ) -> DaoResult<SwipeOutcome> {
        if swiper_id == target_id {
            return Err(DaoError::Validation("Cannot swipe on yourself".to_string()));
        }

        let now = DateTime::now();
        self.swipes
            .collection()
            .update_one(
                doc! { "swiper_id": swiper_id, "target_id": target_id },
                doc! {
                    "$set": { "action": action.as_str(), "updated_at": now },
                    "$setOnInsert": { "created_at": now },
                },
            )
            .upsert(true)
            .await?;

        if !action.is_positive() {
            return Ok(SwipeOutcome { action, new_match: None });
        }

        let reciprocal = self
            .swipes
            .count(doc! {
                "swiper_id": target_id,
                "target_id": swiper_id,
                "action": { "$in": ["like", "super_like"] },
            })
            .await?;
        if reciprocal == 0 {
            return Ok(SwipeOutcome { action, new_match: None });
        }

        let new_match = self.create_match(swiper_id, target_id).await?;
        Ok(SwipeOutcome { action, new_match })
    }

    /// Upserts on the pair key; returns the match only if this call created or
    /// re-activated it.
    async fn create_match(&self, a: ObjectId, b: ObjectId) -> DaoResult<Option<Match>> {
        let now = DateTime::now();
        let key = pair_key(a, b);
        let existing = self.base.find_one(doc! { "pair_key": &key }).await?;
        if let Some(m) = existing {
            if m.is_active {
                return Ok(None);
            }
        }

        let updated = self
            .base
            .collection()
            .find_one_and_update(
                doc! { "pair_key": &key, "is_active": { "$ne": true } },
                doc! {
                    "$set": {
                        "is_active": true,
                        "matched_at": now,
                        "unmatched_by": null,
                        "updated_at": now,
                    },
                    "$setOnInsert": {
                        "user_ids": canonical_pair(a, b),
                        "last_message_at": null,
                        "created_at": now,
                    },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match updated {
            Ok(m) => {
                if let Some(ref m) = m {
                    info!(match_id = ?m.id, "Match created");
                }
                Ok(m)
            }
            // Lost the race to a concurrent swipe: the active match already exists.
            Err(e) if is_duplicate_key(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Match>> {
        self.base
            .find_many(
                doc! { "user_ids": user_id, "is_active": true },
                Some(doc! { "last_message_at": -1, "matched_at": -1 }),
            )
            .await
    }

    /// The active match if `user_id` is one of its two members.
    pub async fn find_for_member(&self, match_id: ObjectId, user_id: ObjectId) -> DaoResult<Match> {
        let m = self.base.find_by_id(match_id).await?;
        if !m.involves(user_id) {
            return Err(DaoError::Forbidden("Not a member of this match".to_string()));
        }
        if !m.is_active {
            return Err(DaoError::NotFound);
        }
        Ok(m)
    }

    pub async fn partner_ids(&self, user_id: ObjectId) -> DaoResult<Vec<ObjectId>> {
        let matches = self.list_for_user(user_id).await?;
        Ok(matches.iter().filter_map(|m| m.other_user(user_id)).collect())
    }

    pub async fn unmatch(&self, match_id: ObjectId, user_id: ObjectId) -> DaoResult<Match> {
        let m = self.find_for_member(match_id, user_id).await?;
        self.base
            .update_by_id(
                match_id,
                doc! { "$set": { "is_active": false, "unmatched_by": user_id } },
            )
            .await?;
        Ok(m)
    }

    pub async fn touch_last_message(&self, match_id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.base
            .update_by_id(match_id, doc! { "$set": { "last_message_at": at } })
            .await
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        *e.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref w))
            if w.code == 11000
    ) || matches!(*e.kind, mongodb::error::ErrorKind::Command(ref c) if c.code == 11000)
}
