pub mod ai;
pub mod auth;
pub mod beta;
pub mod event;
pub mod group_date;
pub mod matches;
pub mod notification;
pub mod share;
pub mod user;

use bson::{DateTime, oid::ObjectId};
use kindred_db::models::GeoPoint;
use kindred_services::validation::validate_location;
use serde::Serialize;

use crate::{error::ApiError, state::AppState};

pub const DEFAULT_RADIUS_KM: f64 = 50.0;
pub const MAX_RADIUS_KM: f64 = 500.0;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

pub fn parse_id(raw: &str, field: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {field}")))
}

pub(crate) fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

pub(crate) fn rfc3339(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

pub(crate) fn to_bson_time(at: chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_chrono(at)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Coordinates {
    pub lng: f64,
    pub lat: f64,
}

impl From<GeoPoint> for Coordinates {
    fn from(point: GeoPoint) -> Self {
        Self {
            lng: point.lng(),
            lat: point.lat(),
        }
    }
}

pub(crate) fn radius(max_km: Option<f64>) -> f64 {
    max_km
        .filter(|km| km.is_finite() && *km > 0.0)
        .unwrap_or(DEFAULT_RADIUS_KM)
        .min(MAX_RADIUS_KM)
}

pub(crate) fn limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// The search origin: explicit coordinates when both are given, else the
/// caller's stored location.
pub(crate) async fn search_origin(
    state: &AppState,
    user_id: ObjectId,
    lng: Option<f64>,
    lat: Option<f64>,
) -> Result<GeoPoint, ApiError> {
    match (lng, lat) {
        (Some(lng), Some(lat)) => validate_location(lng, lat).map_err(ApiError::Validation),
        (None, None) => state
            .load_user(user_id)
            .await?
            .location
            .ok_or_else(|| ApiError::BadRequest("Set your location or pass lng and lat".to_string())),
        _ => Err(ApiError::BadRequest("lng and lat must be given together".to_string())),
    }
}
