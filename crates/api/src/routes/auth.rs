use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use bson::oid::ObjectId;
use chrono::{NaiveDate, Utc};
use kindred_db::models::{Gender, User};
use kindred_services::{
    auth::TokenPair,
    dao::base::DaoError,
    validation::{validate_birth_date, validate_display_name, validate_email},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::{ProfileResponse, to_profile};
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResponse, ok},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub display_name: String,
    /// `YYYY-MM-DD`
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub interested_in: Vec<Gender>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: ProfileResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

type AuthReply = (HeaderMap, axum::Json<ApiResponse<AuthResponse>>);

fn session_reply(
    state: &AppState,
    user: User,
    tokens: TokenPair,
    message: &str,
) -> Result<AuthReply, ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        tokens.access_token, tokens.expires_in
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {e}")))?;
    headers.insert(header::SET_COOKIE, cookie);

    let response = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: to_profile(user, state.online_window(), true),
    };
    Ok((headers, ok(message, response)))
}

fn user_id_of(user: &User) -> Result<ObjectId, ApiError> {
    user.id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, axum::Json<ApiResponse<AuthResponse>>), ApiError> {
    body.validate()?;

    let email = body.email.trim().to_lowercase();
    if !validate_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    validate_display_name(&body.display_name).map_err(ApiError::Validation)?;
    validate_birth_date(body.birth_date, Utc::now().date_naive()).map_err(ApiError::Validation)?;

    let birth_date = body
        .birth_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| bson::DateTime::from_chrono(dt.and_utc()))
        .ok_or_else(|| ApiError::Validation("Invalid birth_date".to_string()))?;

    let password_hash = state.auth.hash_password(&body.password)?;

    let user = state
        .users
        .create(
            email,
            body.display_name.trim().to_string(),
            password_hash,
            birth_date,
            body.gender,
            body.interested_in,
        )
        .await
        .map_err(|e| match e {
            DaoError::DuplicateKey(_) => ApiError::Conflict("Email already registered".to_string()),
            other => other.into(),
        })?;

    let user_id = user_id_of(&user)?;
    let tokens = state.auth.generate_tokens(user_id, &user.email)?;
    let (headers, body) = session_reply(&state, user, tokens, "Registration successful")?;

    Ok((StatusCode::CREATED, headers, body))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<AuthReply, ApiError> {
    let user = state
        .users
        .find_by_email(&body.email.trim().to_lowercase())
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("No password set".to_string()))?;

    let valid = state.auth.verify_password(&body.password, password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user_id = user_id_of(&user)?;
    let tokens = state.auth.generate_tokens(user_id, &user.email)?;
    session_reply(&state, user, tokens, "Login successful")
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<AuthReply, ApiError> {
    let claims = state.auth.verify_refresh_token(&body.refresh_token)?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid user ID".to_string()))?;

    let user = state
        .users
        .find_active(user_id)
        .await
        .map_err(|_| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    let tokens = state.auth.generate_tokens(user_id, &user.email)?;
    session_reply(&state, user, tokens, "Token refreshed")
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<axum::Json<ApiResponse<ProfileResponse>>, ApiError> {
    let user = state.load_user(auth.user_id).await?;
    Ok(ok("Authenticated", to_profile(user, state.online_window(), true)))
}
