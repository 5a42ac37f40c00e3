use axum::{Json, extract::State};
use kindred_services::icebreaker::{
    BioAnalysis, IcebreakerContext, IcebreakerResult, MAX_SUGGESTIONS, analyze_bio,
    conversation_starters,
};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    response::{ApiResult, ok},
    state::AppState,
};

const DEFAULT_COUNT: usize = 3;

#[derive(Debug, Deserialize)]
pub struct IcebreakerRequest {
    pub match_id: String,
    pub count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartersRequest {
    /// Falls back to the caller's own interests.
    pub interests: Option<Vec<String>>,
    pub count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBioRequest {
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartersResponse {
    pub suggestions: Vec<String>,
}

fn count_of(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_COUNT).clamp(1, MAX_SUGGESTIONS)
}

pub async fn icebreakers(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<IcebreakerRequest>,
) -> ApiResult<IcebreakerResult> {
    let match_id = parse_id(&body.match_id, "match_id")?;
    let m = state.matches.find_for_member(match_id, auth.user_id).await?;
    let partner_id = m
        .other_user(auth.user_id)
        .ok_or_else(|| ApiError::Forbidden("Not part of this match".to_string()))?;

    let me = state.load_user(auth.user_id).await?;
    let partner = state.load_user(partner_id).await?;
    let context = IcebreakerContext {
        my_interests: me.interests,
        their_interests: partner.interests,
        their_name: partner.display_name,
        their_bio: Some(partner.bio).filter(|b| !b.trim().is_empty()),
    };

    let result = state.icebreakers.generate(&context, count_of(body.count)).await;
    Ok(ok("Icebreakers generated", result))
}

pub async fn conversation_starters_for(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<StartersRequest>>,
) -> ApiResult<StartersResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let interests = match body.interests.filter(|i| !i.is_empty()) {
        Some(interests) => interests,
        None => state.load_user(auth.user_id).await?.interests,
    };

    let suggestions = conversation_starters(&interests, count_of(body.count));
    Ok(ok("Conversation starters generated", StartersResponse { suggestions }))
}

pub async fn analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<AnalyzeBioRequest>>,
) -> ApiResult<BioAnalysis> {
    let bio = match body.and_then(|Json(b)| b.bio) {
        Some(bio) => bio,
        None => state.load_user(auth.user_id).await?.bio,
    };
    Ok(ok("Bio analyzed", analyze_bio(&bio)))
}
