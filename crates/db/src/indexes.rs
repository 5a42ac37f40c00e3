use mongodb::{Database, IndexModel, options::IndexOptions};
use std::time::Duration;
use tracing::info;

use crate::models::{
    BetaBug, BetaFeedback, BetaSession, Event, GroupDate, Match, Message, Notification,
    SharedProfile, Swipe, User,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "location": "2dsphere" }),
            index(bson::doc! { "is_online": 1, "last_active": -1 }),
        ],
    )
    .await?;

    // Swipes
    create_indexes(
        db,
        Swipe::COLLECTION,
        vec![
            index_unique(bson::doc! { "swiper_id": 1, "target_id": 1 }),
            index(bson::doc! { "target_id": 1, "action": 1 }),
        ],
    )
    .await?;

    // Matches
    create_indexes(
        db,
        Match::COLLECTION,
        vec![
            index_unique(bson::doc! { "pair_key": 1 }),
            index(bson::doc! { "user_ids": 1, "is_active": 1, "last_message_at": -1 }),
        ],
    )
    .await?;

    // Messages
    create_indexes(
        db,
        Message::COLLECTION,
        vec![
            index(bson::doc! { "match_id": 1, "created_at": -1 }),
            index(bson::doc! { "match_id": 1, "sender_id": 1, "read_at": 1 }),
        ],
    )
    .await?;

    // Notifications
    create_indexes(
        db,
        Notification::COLLECTION,
        vec![
            index(bson::doc! { "user_id": 1, "is_read": 1, "created_at": -1 }),
            index(bson::doc! { "user_id": 1, "deferred_until": 1 }),
        ],
    )
    .await?;

    // Events
    create_indexes(
        db,
        Event::COLLECTION,
        vec![
            index(bson::doc! { "location": "2dsphere" }),
            index(bson::doc! { "status": 1, "start_time": 1 }),
            index(bson::doc! { "attendees.user_id": 1 }),
        ],
    )
    .await?;

    // Group dates
    create_indexes(
        db,
        GroupDate::COLLECTION,
        vec![
            index(bson::doc! { "location": "2dsphere" }),
            index(bson::doc! { "status": 1, "scheduled_at": 1 }),
            index(bson::doc! { "participants.user_id": 1 }),
        ],
    )
    .await?;

    // Shared profiles
    create_indexes(
        db,
        SharedProfile::COLLECTION,
        vec![
            index_unique(bson::doc! { "token": 1 }),
            index(bson::doc! { "shared_by": 1, "created_at": -1 }),
            index_ttl(bson::doc! { "expires_at": 1 }, Duration::ZERO),
        ],
    )
    .await?;

    // Beta telemetry
    create_indexes(
        db,
        BetaFeedback::COLLECTION,
        vec![index(bson::doc! { "category": 1, "created_at": -1 })],
    )
    .await?;
    create_indexes(
        db,
        BetaBug::COLLECTION,
        vec![index(bson::doc! { "status": 1, "severity": 1 })],
    )
    .await?;
    create_indexes(
        db,
        BetaSession::COLLECTION,
        vec![index(bson::doc! { "user_id": 1, "started_at": -1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn index_ttl(keys: bson::Document, expire_after: Duration) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().expire_after(expire_after).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
