use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::{doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use kindred_db::models::{
    GroupDate, GroupDateStatus, NotificationType, ParticipantStatus,
};
use kindred_services::{
    dao::group_date::NewGroupDate, notify::NewNotification, validation::validate_location,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use super::{Coordinates, hex, limit, parse_id, radius, rfc3339, search_origin, to_bson_time};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResponse, ApiResult, ok},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupDateRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 80))]
    pub activity: String,
    pub lng: f64,
    pub lat: f64,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 2, max = 20))]
    pub max_participants: u32,
    /// Matches to invite right away.
    #[serde(default)]
    pub invitee_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupNearbyQuery {
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    pub max_km: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: GroupDateStatus,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub user_id: String,
    pub status: ParticipantStatus,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
pub struct GroupDateResponse {
    pub id: String,
    pub organizer_id: String,
    pub title: String,
    pub description: String,
    pub activity: String,
    pub location: Coordinates,
    pub scheduled_at: String,
    pub max_participants: u32,
    pub seats_taken: usize,
    pub participants: Vec<ParticipantResponse>,
    pub status: GroupDateStatus,
    pub created_at: String,
}

fn to_response(g: GroupDate) -> GroupDateResponse {
    GroupDateResponse {
        id: hex(g.id),
        organizer_id: g.organizer_id.to_hex(),
        seats_taken: g.seated_count(),
        title: g.title,
        description: g.description,
        activity: g.activity,
        location: Coordinates::from(g.location),
        scheduled_at: rfc3339(g.scheduled_at),
        max_participants: g.max_participants,
        participants: g
            .participants
            .into_iter()
            .map(|p| ParticipantResponse {
                user_id: p.user_id.to_hex(),
                status: p.status,
                joined_at: rfc3339(p.joined_at),
            })
            .collect(),
        status: g.status,
        created_at: rfc3339(g.created_at),
    }
}

/// Invitations are limited to the organizer's active matches.
async fn invite_match(
    state: &AppState,
    group: &GroupDate,
    organizer_name: &str,
    invitee_id: ObjectId,
) -> Result<GroupDate, ApiError> {
    let group_id = group
        .id
        .ok_or_else(|| ApiError::Internal("Stored group date has no id".to_string()))?;
    let partners = state.matches.partner_ids(group.organizer_id).await?;
    if !partners.contains(&invitee_id) {
        return Err(ApiError::Forbidden("You can only invite your matches".to_string()));
    }

    let updated = state
        .group_dates
        .invite(group_id, group.organizer_id, invitee_id)
        .await?;
    state
        .notify(
            invitee_id,
            NewNotification {
                notification_type: NotificationType::GroupDate,
                title: "You're invited to a group date".to_string(),
                body: format!("{organizer_name} invited you to {}", group.title),
                data: Some(doc! { "group_date_id": group_id.to_hex() }),
            },
        )
        .await;
    Ok(updated)
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateGroupDateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupDateResponse>>), ApiError> {
    body.validate()?;
    let location = validate_location(body.lng, body.lat).map_err(ApiError::Validation)?;
    if body.scheduled_at <= Utc::now() {
        return Err(ApiError::Validation("scheduled_at must be in the future".to_string()));
    }
    let invitees = body
        .invitee_ids
        .iter()
        .map(|id| parse_id(id, "invitee_id"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut group = state
        .group_dates
        .create(
            auth.user_id,
            NewGroupDate {
                title: body.title.trim().to_string(),
                description: body.description,
                activity: body.activity.trim().to_string(),
                location,
                scheduled_at: to_bson_time(body.scheduled_at),
                max_participants: body.max_participants,
            },
        )
        .await?;

    let organizer = state.load_user(auth.user_id).await?;
    for invitee_id in invitees {
        match invite_match(&state, &group, &organizer.display_name, invitee_id).await {
            Ok(updated) => group = updated,
            Err(e) => warn!(?invitee_id, %e, "Skipped group date invite"),
        }
    }

    Ok((StatusCode::CREATED, ok("Group date created", to_response(group))))
}

pub async fn nearby(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<GroupNearbyQuery>,
) -> ApiResult<Vec<GroupDateResponse>> {
    let origin = search_origin(&state, auth.user_id, query.lng, query.lat).await?;
    let groups = state
        .group_dates
        .find_nearby(origin, radius(query.max_km), limit(query.limit))
        .await?;
    Ok(ok("Group dates fetched", groups.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(group_id): Path<String>,
) -> ApiResult<GroupDateResponse> {
    let group_id = parse_id(&group_id, "group_date_id")?;
    let group = state.group_dates.base.find_by_id(group_id).await?;
    Ok(ok("Group date fetched", to_response(group)))
}

pub async fn join(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
) -> ApiResult<GroupDateResponse> {
    let group_id = parse_id(&group_id, "group_date_id")?;
    let group = state.group_dates.join(group_id, auth.user_id).await?;

    if group.organizer_id != auth.user_id {
        let joiner = state.load_user(auth.user_id).await?;
        state
            .notify(
                group.organizer_id,
                NewNotification {
                    notification_type: NotificationType::GroupDate,
                    title: "Someone joined your group date".to_string(),
                    body: format!("{} joined {}", joiner.display_name, group.title),
                    data: Some(doc! { "group_date_id": group_id.to_hex() }),
                },
            )
            .await;
    }
    Ok(ok("Joined group date", to_response(group)))
}

pub async fn invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
    Json(body): Json<InviteRequest>,
) -> ApiResult<GroupDateResponse> {
    let group_id = parse_id(&group_id, "group_date_id")?;
    let invitee_id = parse_id(&body.user_id, "user_id")?;
    let group = state.group_dates.base.find_by_id(group_id).await?;
    if group.organizer_id != auth.user_id {
        return Err(ApiError::Forbidden("Only the organizer can invite".to_string()));
    }

    let organizer = state.load_user(auth.user_id).await?;
    let group = invite_match(&state, &group, &organizer.display_name, invitee_id).await?;
    Ok(ok("Invitation sent", to_response(group)))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
) -> ApiResult<GroupDateResponse> {
    let group_id = parse_id(&group_id, "group_date_id")?;
    let group = state.group_dates.leave(group_id, auth.user_id).await?;
    Ok(ok("Left group date", to_response(group)))
}

/// Organizer-only. Everyone still holding a seat hears about the change.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<GroupDateResponse> {
    let group_id = parse_id(&group_id, "group_date_id")?;
    let group = state
        .group_dates
        .update_status(group_id, auth.user_id, body.status)
        .await?;

    let seated = state.group_dates.seated_user_ids(group_id).await?;
    for user_id in seated.into_iter().filter(|id| *id != auth.user_id) {
        state
            .notify(
                user_id,
                NewNotification {
                    notification_type: NotificationType::GroupDate,
                    title: format!("{} is {}", group.title, body.status.as_str()),
                    body: format!("The organizer marked {} as {}", group.title, body.status.as_str()),
                    data: Some(doc! {
                        "group_date_id": group_id.to_hex(),
                        "status": body.status.as_str(),
                    }),
                },
            )
            .await;
    }

    Ok(ok("Group date updated", to_response(group)))
}
