use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::doc;
use chrono::Utc;
use kindred_db::models::{Gender, NotificationType, User};
use kindred_services::{
    activity::{Activity, activity_status},
    dao::user::ProfileUpdate,
    notify::NewNotification,
    validation::{age_on, normalize_interests, validate_bio, validate_display_name, validate_location},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Coordinates, hex, limit, parse_id, radius, rfc3339, search_origin};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResult, ok},
    state::AppState,
};

const MAX_PHOTOS: usize = 6;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    pub age: Option<u32>,
    pub gender: Gender,
    pub interested_in: Vec<Gender>,
    pub bio: String,
    pub interests: Vec<String>,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    pub activity: Activity,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ViewerResponse {
    pub viewer_id: String,
    pub display_name: Option<String>,
    pub photo: Option<String>,
    pub viewed_at: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    #[validate(length(max = 6))]
    pub photos: Option<Vec<String>>,
    pub gender: Option<Gender>,
    pub interested_in: Option<Vec<Gender>>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    pub max_km: Option<f64>,
    pub limit: Option<i64>,
}

pub fn activity_of(user: &User, online_window: chrono::Duration) -> Activity {
    activity_status(
        user.is_online,
        user.last_active.map(|d| d.to_chrono()),
        Utc::now(),
        online_window,
    )
}

/// `include_private` adds the email and exact location, for the owner's own view.
pub fn to_profile(user: User, online_window: chrono::Duration, include_private: bool) -> ProfileResponse {
    let activity = activity_of(&user, online_window);
    let age = age_on(user.birth_date.to_chrono().date_naive(), Utc::now().date_naive());
    ProfileResponse {
        id: hex(user.id),
        email: include_private.then_some(user.email),
        display_name: user.display_name,
        age,
        gender: user.gender,
        interested_in: user.interested_in,
        bio: user.bio,
        interests: user.interests,
        photos: user.photos,
        location: if include_private {
            user.location.map(Coordinates::from)
        } else {
            None
        },
        activity,
        created_at: rfc3339(user.created_at),
    }
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<ProfileResponse> {
    let user = state.load_user(auth.user_id).await?;
    Ok(ok("Profile fetched", to_profile(user, state.online_window(), true)))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<ProfileResponse> {
    body.validate()?;

    if let Some(ref name) = body.display_name {
        validate_display_name(name).map_err(ApiError::Validation)?;
    }
    if let Some(ref bio) = body.bio {
        validate_bio(bio).map_err(ApiError::Validation)?;
    }
    let interests = body
        .interests
        .as_deref()
        .map(normalize_interests)
        .transpose()
        .map_err(ApiError::Validation)?;
    if body.photos.as_ref().is_some_and(|p| p.len() > MAX_PHOTOS) {
        return Err(ApiError::Validation(format!("At most {MAX_PHOTOS} photos")));
    }

    state
        .users
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                display_name: body.display_name.map(|n| n.trim().to_string()),
                bio: body.bio,
                interests,
                photos: body.photos,
                gender: body.gender,
                interested_in: body.interested_in,
            },
        )
        .await?;
    state.user_cache.invalidate(&auth.user_id);

    let user = state.load_user(auth.user_id).await?;
    Ok(ok("Profile updated", to_profile(user, state.online_window(), true)))
}

pub async fn update_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<LocationRequest>,
) -> ApiResult<Coordinates> {
    let point = validate_location(body.lng, body.lat).map_err(ApiError::Validation)?;
    state.users.update_location(auth.user_id, point).await?;
    state.user_cache.invalidate(&auth.user_id);
    Ok(ok("Location updated", Coordinates::from(point)))
}

pub async fn nearby(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Vec<ProfileResponse>> {
    let origin = search_origin(&state, auth.user_id, query.lng, query.lat).await?;
    let users = state
        .users
        .find_nearby(auth.user_id, origin, radius(query.max_km), limit(query.limit))
        .await?;

    let window = state.online_window();
    let items = users
        .into_iter()
        .map(|u| to_profile(u, window, false))
        .collect();
    Ok(ok("Nearby users fetched", items))
}

/// Someone else's profile. Counts as a profile view for its owner.
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileResponse> {
    let owner_id = parse_id(&user_id, "user_id")?;
    let owner = state.load_user(owner_id).await?;

    if owner_id != auth.user_id && state.users.record_profile_view(owner_id, auth.user_id).await? {
        state.user_cache.invalidate(&owner_id);
        let viewer = state.load_user(auth.user_id).await?;
        state
            .notify(
                owner_id,
                NewNotification {
                    notification_type: NotificationType::ProfileView,
                    title: "Someone viewed your profile".to_string(),
                    body: format!("{} checked out your profile", viewer.display_name),
                    data: Some(doc! { "viewer_id": auth.user_id.to_hex() }),
                },
            )
            .await;
    }

    let own = owner_id == auth.user_id;
    Ok(ok("Profile fetched", to_profile(owner, state.online_window(), own)))
}

pub async fn viewers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<ViewerResponse>> {
    let views = state.users.recent_viewers(auth.user_id).await?;
    let ids: Vec<_> = views.iter().map(|v| v.viewer_id).collect();
    let users = state
        .users
        .base
        .find_many(doc! { "_id": { "$in": ids }, "deleted_at": null }, None)
        .await?;

    let items = views
        .into_iter()
        .map(|view| {
            let viewer = users.iter().find(|u| u.id == Some(view.viewer_id));
            ViewerResponse {
                viewer_id: view.viewer_id.to_hex(),
                display_name: viewer.map(|u| u.display_name.clone()),
                photo: viewer.and_then(|u| u.photos.first().cloned()),
                viewed_at: rfc3339(view.viewed_at),
            }
        })
        .collect();
    Ok(ok("Profile viewers fetched", items))
}

pub async fn activity(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<Activity> {
    let user_id = parse_id(&user_id, "user_id")?;
    // Presence changes too often for the cached copy.
    let user = state.users.find_active(user_id).await?;
    Ok(ok("Activity fetched", activity_of(&user, state.online_window())))
}
