use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::doc;
use chrono::{DateTime, Utc};
use kindred_db::models::{AttendeeStatus, Event, EventCategory, EventStatus, NotificationType};
use kindred_services::{
    dao::event::NewEvent, notify::NewNotification, validation::validate_location,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Coordinates, hex, limit, parse_id, radius, rfc3339, search_origin, to_bson_time};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResponse, ApiResult, done, ok},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[serde(default)]
    pub category: EventCategory,
    pub lng: f64,
    pub lat: f64,
    pub address: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 10000))]
    pub max_attendees: u32,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct EventNearbyQuery {
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    pub max_km: Option<f64>,
    pub category: Option<EventCategory>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub status: Option<AttendeeStatus>,
}

#[derive(Debug, Serialize)]
pub struct AttendeeResponse {
    pub user_id: String,
    pub status: AttendeeStatus,
    pub registered_at: String,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: String,
    pub organizer_id: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: Coordinates,
    pub address: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub max_attendees: u32,
    pub attendee_count: usize,
    pub spots_left: usize,
    pub attendees: Vec<AttendeeResponse>,
    pub is_public: bool,
    pub status: EventStatus,
    pub created_at: String,
}

fn to_response(e: Event) -> EventResponse {
    let attendee_count = e.active_attendee_count();
    EventResponse {
        id: hex(e.id),
        organizer_id: e.organizer_id.to_hex(),
        title: e.title,
        description: e.description,
        category: e.category,
        location: Coordinates::from(e.location),
        address: e.address,
        start_time: rfc3339(e.start_time),
        end_time: e.end_time.map(rfc3339),
        max_attendees: e.max_attendees,
        attendee_count,
        spots_left: (e.max_attendees as usize).saturating_sub(attendee_count),
        attendees: e
            .attendees
            .into_iter()
            .filter(|a| a.status != AttendeeStatus::Cancelled)
            .map(|a| AttendeeResponse {
                user_id: a.user_id.to_hex(),
                status: a.status,
                registered_at: rfc3339(a.registered_at),
            })
            .collect(),
        is_public: e.is_public,
        status: e.status,
        created_at: rfc3339(e.created_at),
    }
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EventResponse>>), ApiError> {
    body.validate()?;
    let location = validate_location(body.lng, body.lat).map_err(ApiError::Validation)?;
    if body.start_time <= Utc::now() {
        return Err(ApiError::Validation("start_time must be in the future".to_string()));
    }

    let event = state
        .events
        .create(
            auth.user_id,
            NewEvent {
                title: body.title.trim().to_string(),
                description: body.description,
                category: body.category,
                location,
                address: body.address,
                start_time: to_bson_time(body.start_time),
                end_time: body.end_time.map(to_bson_time),
                max_attendees: body.max_attendees,
                is_public: body.is_public,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, ok("Event created", to_response(event))))
}

pub async fn nearby(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EventNearbyQuery>,
) -> ApiResult<Vec<EventResponse>> {
    let origin = search_origin(&state, auth.user_id, query.lng, query.lat).await?;
    let events = state
        .events
        .find_nearby(origin, radius(query.max_km), query.category, limit(query.limit))
        .await?;
    Ok(ok("Events fetched", events.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> ApiResult<EventResponse> {
    let event_id = parse_id(&event_id, "event_id")?;
    let event = state.events.base.find_by_id(event_id).await?;

    let attending = event.attendees.iter().any(|a| a.user_id == auth.user_id);
    if !event.is_public && event.organizer_id != auth.user_id && !attending {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }
    Ok(ok("Event fetched", to_response(event)))
}

pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
    body: Option<Json<RegisterRequest>>,
) -> ApiResult<EventResponse> {
    let event_id = parse_id(&event_id, "event_id")?;
    let status = body
        .and_then(|Json(b)| b.status)
        .unwrap_or(AttendeeStatus::Going);

    let event = state.events.register(event_id, auth.user_id, status).await?;

    if event.organizer_id != auth.user_id {
        let attendee = state.load_user(auth.user_id).await?;
        let verb = match status {
            AttendeeStatus::Interested => "is interested in",
            _ => "is going to",
        };
        state
            .notify(
                event.organizer_id,
                NewNotification {
                    notification_type: NotificationType::Event,
                    title: "New event registration".to_string(),
                    body: format!("{} {verb} {}", attendee.display_name, event.title),
                    data: Some(doc! { "event_id": event_id.to_hex() }),
                },
            )
            .await;
    }

    Ok(ok("Registered for event", to_response(event)))
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> ApiResult<EventResponse> {
    let event_id = parse_id(&event_id, "event_id")?;
    let event = state
        .events
        .cancel_registration(event_id, auth.user_id)
        .await?;
    Ok(ok("Registration cancelled", to_response(event)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> ApiResult<()> {
    let event_id = parse_id(&event_id, "event_id")?;
    state.events.delete(event_id, auth.user_id).await?;
    Ok(done("Event deleted"))
}
