use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kindred_db::models::{BetaBug, BetaFeedback, BetaSession, BugSeverity, BugStatus};
use kindred_services::dao::beta::BetaStats;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{hex, parse_id, rfc3339};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResponse, ApiResult, ok},
    state::AppState,
};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    pub screen: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BugRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub description: String,
    #[serde(default)]
    pub severity: BugSeverity,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub steps_to_reproduce: Vec<String>,
    pub device_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BugStatusRequest {
    pub status: BugStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub device: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub screens_visited: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: String,
    pub category: String,
    pub rating: u8,
    pub message: String,
    pub screen: Option<String>,
    pub app_version: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct BugResponse {
    pub id: String,
    pub reporter_id: String,
    pub title: String,
    pub description: String,
    pub severity: BugSeverity,
    pub status: BugStatus,
    pub steps_to_reproduce: Vec<String>,
    pub device_info: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub screens_visited: Vec<String>,
    pub device: Option<String>,
    pub app_version: Option<String>,
}

fn feedback_response(f: BetaFeedback) -> FeedbackResponse {
    FeedbackResponse {
        id: hex(f.id),
        category: f.category,
        rating: f.rating,
        message: f.message,
        screen: f.screen,
        app_version: f.app_version,
        created_at: rfc3339(f.created_at),
    }
}

fn bug_response(b: BetaBug) -> BugResponse {
    BugResponse {
        id: hex(b.id),
        reporter_id: b.user_id.to_hex(),
        title: b.title,
        description: b.description,
        severity: b.severity,
        status: b.status,
        steps_to_reproduce: b.steps_to_reproduce,
        device_info: b.device_info,
        created_at: rfc3339(b.created_at),
        updated_at: rfc3339(b.updated_at),
    }
}

fn session_response(s: BetaSession) -> SessionResponse {
    SessionResponse {
        id: hex(s.id),
        started_at: rfc3339(s.started_at),
        ended_at: s.ended_at.map(rfc3339),
        duration_secs: s.duration_secs,
        screens_visited: s.screens_visited,
        device: s.device,
        app_version: s.app_version,
    }
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FeedbackRequest>,
) -> Created<FeedbackResponse> {
    body.validate()?;
    let feedback = state
        .beta
        .submit_feedback(
            auth.user_id,
            body.category.trim().to_lowercase(),
            body.rating,
            body.message,
            body.screen,
            body.app_version,
        )
        .await?;
    Ok((StatusCode::CREATED, ok("Feedback received", feedback_response(feedback))))
}

pub async fn report_bug(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<BugRequest>,
) -> Created<BugResponse> {
    body.validate()?;
    let bug = state
        .beta
        .report_bug(
            auth.user_id,
            body.title.trim().to_string(),
            body.description,
            body.severity,
            body.steps_to_reproduce,
            body.device_info,
        )
        .await?;
    Ok((StatusCode::CREATED, ok("Bug reported", bug_response(bug))))
}

pub async fn update_bug_status(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(bug_id): Path<String>,
    Json(body): Json<BugStatusRequest>,
) -> ApiResult<BugResponse> {
    let bug_id = parse_id(&bug_id, "bug_id")?;
    let bug = state.beta.update_bug_status(bug_id, body.status).await?;
    Ok(ok("Bug status updated", bug_response(bug)))
}

pub async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<StartSessionRequest>>,
) -> Created<SessionResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let session = state
        .beta
        .start_session(auth.user_id, body.device, body.app_version)
        .await?;
    Ok((StatusCode::CREATED, ok("Session started", session_response(session))))
}

pub async fn end_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
    body: Option<Json<EndSessionRequest>>,
) -> ApiResult<SessionResponse> {
    let session_id = parse_id(&session_id, "session_id")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let session = state
        .beta
        .end_session(session_id, auth.user_id, body.screens_visited)
        .await?;
    Ok(ok("Session ended", session_response(session)))
}

pub async fn stats(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<BetaStats> {
    let stats = state.beta.stats().await?;
    Ok(ok("Beta stats fetched", stats))
}
