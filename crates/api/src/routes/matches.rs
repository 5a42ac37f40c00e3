use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::doc;
use kindred_db::models::{Match, NotificationType, SwipeAction};
use kindred_realtime::protocol::{MessagePayload, ReadPayload};
use kindred_services::{
    activity::Activity,
    dao::base::{PaginatedResult, PaginationParams},
    notify::NewNotification,
};
use serde::{Deserialize, Serialize};

use super::{hex, parse_id, rfc3339, user::activity_of};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResult, done, ok},
    state::AppState,
    ws::chat::{self, message_payload},
};

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub target_id: String,
    pub action: SwipeAction,
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub action: SwipeAction,
    pub matched: bool,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub new_match: Option<MatchResponse>,
}

#[derive(Debug, Serialize)]
pub struct PartnerSummary {
    pub id: String,
    pub display_name: String,
    pub photo: Option<String>,
    pub activity: Activity,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub id: String,
    pub partner: Option<PartnerSummary>,
    pub matched_at: String,
    pub last_message_at: Option<String>,
    pub last_message: Option<MessagePayload>,
    pub unread_count: u64,
}

async fn to_response(state: &AppState, m: Match, viewer: bson::oid::ObjectId) -> Result<MatchResponse, ApiError> {
    let match_id = m.id.ok_or_else(|| ApiError::Internal("Stored match has no id".to_string()))?;

    let partner = match m.other_user(viewer) {
        Some(partner_id) => state.load_user(partner_id).await.ok().map(|u| PartnerSummary {
            id: partner_id.to_hex(),
            activity: activity_of(&u, state.online_window()),
            display_name: u.display_name,
            photo: u.photos.first().cloned(),
        }),
        None => None,
    };
    let last_message = state
        .messages
        .last_in_match(match_id)
        .await?
        .map(|msg| message_payload(&msg));
    let unread_count = state.messages.unread_count(match_id, viewer).await?;

    Ok(MatchResponse {
        id: hex(m.id),
        partner,
        matched_at: rfc3339(m.matched_at),
        last_message_at: m.last_message_at.map(rfc3339),
        last_message,
        unread_count,
    })
}

pub async fn swipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SwipeRequest>,
) -> ApiResult<SwipeResponse> {
    let target_id = parse_id(&body.target_id, "target_id")?;
    let target = state.load_user(target_id).await?;

    let outcome = state.matches.swipe(auth.user_id, target_id, body.action).await?;
    let swiper = state.load_user(auth.user_id).await?;

    let new_match = match outcome.new_match {
        Some(m) => {
            let match_id = hex(m.id);
            for (recipient, partner_name) in [
                (target_id, &swiper.display_name),
                (auth.user_id, &target.display_name),
            ] {
                state
                    .notify(
                        recipient,
                        NewNotification {
                            notification_type: NotificationType::Match,
                            title: "It's a match!".to_string(),
                            body: format!("You and {partner_name} liked each other"),
                            data: Some(doc! { "match_id": match_id.clone() }),
                        },
                    )
                    .await;
            }
            Some(to_response(&state, m, auth.user_id).await?)
        }
        None if outcome.action.is_positive() => {
            let title = match outcome.action {
                SwipeAction::SuperLike => "Someone super liked you!",
                _ => "Someone likes you",
            };
            state
                .notify(
                    target_id,
                    NewNotification {
                        notification_type: NotificationType::Like,
                        title: title.to_string(),
                        body: "Keep swiping to find out who".to_string(),
                        data: Some(doc! { "action": outcome.action.as_str() }),
                    },
                )
                .await;
            None
        }
        None => None,
    };

    Ok(ok(
        "Swipe recorded",
        SwipeResponse {
            action: outcome.action,
            matched: new_match.is_some(),
            new_match,
        },
    ))
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<MatchResponse>> {
    let matches = state.matches.list_for_user(auth.user_id).await?;
    let mut items = Vec::with_capacity(matches.len());
    for m in matches {
        items.push(to_response(&state, m, auth.user_id).await?);
    }
    Ok(ok("Matches fetched", items))
}

pub async fn unmatch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> ApiResult<()> {
    let match_id = parse_id(&match_id, "match_id")?;
    state.matches.unmatch(match_id, auth.user_id).await?;
    Ok(done("Unmatched"))
}

pub async fn messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResult<MessagePayload>> {
    let match_id = parse_id(&match_id, "match_id")?;
    state.matches.find_for_member(match_id, auth.user_id).await?;

    let page = state.messages.find_in_match(match_id, &params).await?;
    Ok(ok("Messages fetched", page.map(|m| message_payload(&m))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> ApiResult<ReadPayload> {
    let match_id = parse_id(&match_id, "match_id")?;
    let receipt = chat::mark_read(&state, auth.user_id, match_id).await?;
    Ok(ok("Messages marked read", receipt))
}
