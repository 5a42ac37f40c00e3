use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kindred_db::models::SharedProfile;
use kindred_services::dao::base::DaoError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{parse_id, rfc3339, user::{ProfileResponse, to_profile}};
use crate::{
    error::ApiError,
    extractors::auth::{AuthUser, MaybeAuthUser},
    response::{ApiResponse, ApiResult, done, ok},
    state::AppState,
};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateShareRequest {
    /// Defaults to the caller's own profile.
    pub user_id: Option<String>,
    #[validate(length(max = 280))]
    pub note: Option<String>,
    pub ttl_hours: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub token: String,
    pub url: String,
    pub user_id: String,
    pub note: Option<String>,
    pub expires_at: String,
    pub view_count: u32,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct SharedProfileResponse {
    pub profile: ProfileResponse,
    pub note: Option<String>,
    pub shared_by: String,
    pub expires_at: String,
    pub view_count: u32,
}

pub fn share_url(token: &str) -> String {
    format!("/api/social/share/{token}")
}

fn to_link(share: SharedProfile) -> ShareLinkResponse {
    ShareLinkResponse {
        url: share_url(&share.token),
        token: share.token,
        user_id: share.user_id.to_hex(),
        note: share.note,
        expires_at: rfc3339(share.expires_at),
        view_count: share.view_count,
        created_at: rfc3339(share.created_at),
    }
}

/// Requested lifetime clamped to `1..=max`, or the default when absent.
pub fn clamp_ttl(requested: Option<u32>, default_hours: u32, max_hours: u32) -> u32 {
    let max_hours = max_hours.max(1);
    requested
        .unwrap_or(default_hours)
        .clamp(1, max_hours)
}

/// Users may share their own profile or the profile of an active match.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<CreateShareRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<ShareLinkResponse>>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;

    let subject = match body.user_id.as_deref() {
        Some(raw) => parse_id(raw, "user_id")?,
        None => auth.user_id,
    };
    if subject != auth.user_id {
        let partners = state.matches.partner_ids(auth.user_id).await?;
        if !partners.contains(&subject) {
            return Err(ApiError::Forbidden(
                "You can only share your own profile or a match's".to_string(),
            ));
        }
    }
    state.load_user(subject).await?;

    let sharing = &state.settings.sharing;
    let ttl_hours = clamp_ttl(body.ttl_hours, sharing.default_ttl_hours, sharing.max_ttl_hours);
    let note = body
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let share = state
        .shares
        .create(subject, auth.user_id, ttl_hours, note)
        .await?;
    Ok((StatusCode::CREATED, ok("Share link created", to_link(share))))
}

pub async fn mine(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<ShareLinkResponse>> {
    let shares = state.shares.list_by_sharer(auth.user_id).await?;
    Ok(ok("Share links fetched", shares.into_iter().map(to_link).collect()))
}

/// Public view. Anonymous callers are counted too.
pub async fn view(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(token): Path<String>,
) -> ApiResult<SharedProfileResponse> {
    let share = state
        .shares
        .record_view(&token, viewer)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::NotFound("Share link expired or revoked".to_string()),
            other => other.into(),
        })?;
    let user = state.load_user(share.user_id).await?;

    Ok(ok(
        "Shared profile fetched",
        SharedProfileResponse {
            profile: to_profile(user, state.online_window(), false),
            note: share.note,
            shared_by: share.shared_by.to_hex(),
            expires_at: rfc3339(share.expires_at),
            view_count: share.view_count,
        },
    ))
}

pub async fn revoke(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> ApiResult<()> {
    state.shares.revoke(&token, auth.user_id).await?;
    Ok(done("Share link revoked"))
}
