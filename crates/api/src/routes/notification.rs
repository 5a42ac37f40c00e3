use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use kindred_db::models::{Notification, NotificationPrefs, NotificationType};
use kindred_services::{
    dao::base::{PaginatedResult, PaginationParams},
    notify::{QuietHours, quiet_hours::parse_hhmm},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{hex, parse_id, rfc3339};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResult, done, ok},
    state::AppState,
};

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListQuery {
    fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuietHoursStatus {
    pub enabled: bool,
    pub active: bool,
    pub start: String,
    pub end: String,
    pub utc_offset_minutes: i32,
    pub ends_at: Option<String>,
}

pub fn to_response(n: Notification) -> NotificationResponse {
    NotificationResponse {
        id: hex(n.id),
        notification_type: n.notification_type,
        title: n.title,
        body: n.body,
        data: n
            .data
            .map(|d| bson::Bson::Document(d).into_relaxed_extjson()),
        is_read: n.is_read,
        read_at: n.read_at.map(rfc3339),
        created_at: rfc3339(n.created_at),
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResult<NotificationResponse>> {
    let page = state
        .notifications
        .list_for_user(auth.user_id, query.unread_only, &query.pagination())
        .await?;
    Ok(ok("Notifications fetched", page.map(to_response)))
}

pub async fn unread_count(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Value> {
    let count = state.notifications.unread_count(auth.user_id).await?;
    Ok(ok("Unread count fetched", serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&notification_id, "notification_id")?;
    state.notifications.mark_read(auth.user_id, id).await?;
    Ok(done("Notification marked read"))
}

pub async fn mark_all_read(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Value> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(ok("All notifications marked read", serde_json::json!({ "updated": updated })))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&notification_id, "notification_id")?;
    state.notifications.delete(auth.user_id, id).await?;
    Ok(done("Notification deleted"))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<NotificationPrefs> {
    let user = state.load_user(auth.user_id).await?;
    Ok(ok("Preferences fetched", user.notification_preferences))
}

fn validate_prefs(prefs: &NotificationPrefs) -> Result<(), ApiError> {
    let quiet = &prefs.quiet_hours;
    if parse_hhmm(&quiet.start).is_none() || parse_hhmm(&quiet.end).is_none() {
        return Err(ApiError::Validation(
            "Quiet hours must use HH:MM times".to_string(),
        ));
    }
    if quiet.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
        return Err(ApiError::Validation(
            "utc_offset_minutes must be within ±14 hours".to_string(),
        ));
    }
    Ok(())
}

/// Replaces the whole preference document. Missing toggles default to on.
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut prefs): Json<NotificationPrefs>,
) -> ApiResult<NotificationPrefs> {
    validate_prefs(&prefs)?;
    prefs.quiet_hours.start = prefs.quiet_hours.start.trim().to_string();
    prefs.quiet_hours.end = prefs.quiet_hours.end.trim().to_string();

    state
        .users
        .update_notification_prefs(auth.user_id, &prefs)
        .await?;
    state.user_cache.invalidate(&auth.user_id);
    Ok(ok("Preferences updated", prefs))
}

pub fn quiet_status(prefs: &NotificationPrefs, now: chrono::DateTime<Utc>) -> QuietHoursStatus {
    let quiet = &prefs.quiet_hours;
    let ends_at = QuietHours::from_prefs(quiet).and_then(|q| q.window_end(now));
    QuietHoursStatus {
        enabled: quiet.enabled,
        active: ends_at.is_some(),
        start: quiet.start.clone(),
        end: quiet.end.clone(),
        utc_offset_minutes: quiet.utc_offset_minutes,
        ends_at: ends_at.map(|t| t.to_rfc3339()),
    }
}

pub async fn quiet_hours_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<QuietHoursStatus> {
    let user = state.load_user(auth.user_id).await?;
    Ok(ok(
        "Quiet hours status fetched",
        quiet_status(&user.notification_preferences, Utc::now()),
    ))
}
