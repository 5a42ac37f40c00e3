pub mod background;
pub mod error;
pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me));

    let user_routes = Router::new()
        .route("/me", get(routes::user::me).put(routes::user::update_me))
        .route("/me/location", put(routes::user::update_location))
        .route("/me/viewers", get(routes::user::viewers))
        .route("/nearby", get(routes::user::nearby))
        .route("/{user_id}", get(routes::user::get_profile))
        .route("/{user_id}/activity", get(routes::user::activity));

    let match_routes = Router::new()
        .route("/", get(routes::matches::list))
        .route("/swipe", post(routes::matches::swipe))
        .route("/{match_id}", delete(routes::matches::unmatch))
        .route("/{match_id}/messages", get(routes::matches::messages))
        .route("/{match_id}/read", post(routes::matches::mark_read));

    let notification_routes = Router::new()
        .route("/", get(routes::notification::list))
        .route("/unread-count", get(routes::notification::unread_count))
        .route("/read-all", put(routes::notification::mark_all_read))
        .route(
            "/preferences",
            get(routes::notification::get_preferences).put(routes::notification::update_preferences),
        )
        .route("/quiet-hours/status", get(routes::notification::quiet_hours_status))
        .route("/{notification_id}/read", put(routes::notification::mark_read))
        .route(
            "/{notification_id}",
            delete(routes::notification::delete),
        );

    let event_routes = Router::new()
        .route("/", post(routes::event::create))
        .route("/nearby", get(routes::event::nearby))
        .route(
            "/{event_id}",
            get(routes::event::get).delete(routes::event::delete),
        )
        .route(
            "/{event_id}/register",
            post(routes::event::register).delete(routes::event::cancel_registration),
        );

    let group_date_routes = Router::new()
        .route("/", post(routes::group_date::create))
        .route("/nearby", get(routes::group_date::nearby))
        .route("/{group_id}", get(routes::group_date::get))
        .route("/{group_id}/join", post(routes::group_date::join))
        .route("/{group_id}/invite", post(routes::group_date::invite))
        .route("/{group_id}/leave", post(routes::group_date::leave))
        .route("/{group_id}/status", put(routes::group_date::update_status));

    // Viewing a share is public; the rest needs a session.
    let share_routes = Router::new()
        .route("/", post(routes::share::create))
        .route("/mine", get(routes::share::mine))
        .route(
            "/{token}",
            get(routes::share::view).delete(routes::share::revoke),
        );

    let social_routes = Router::new()
        .nest("/events", event_routes)
        .nest("/group-dates", group_date_routes)
        .nest("/share", share_routes);

    let ai_routes = Router::new()
        .route("/icebreakers", post(routes::ai::icebreakers))
        .route(
            "/conversation-starters",
            post(routes::ai::conversation_starters_for),
        )
        .route("/analyze-bio", post(routes::ai::analyze));

    let beta_routes = Router::new()
        .route("/feedback", post(routes::beta::submit_feedback))
        .route("/bugs", post(routes::beta::report_bug))
        .route("/bugs/{bug_id}/status", put(routes::beta::update_bug_status))
        .route("/sessions", post(routes::beta::start_session))
        .route("/sessions/{session_id}/end", put(routes::beta::end_session))
        .route("/stats", get(routes::beta::stats));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/matches", match_routes)
        .nest("/notifications", notification_routes)
        .nest("/social", social_routes)
        .nest("/ai", ai_routes)
        .nest("/beta", beta_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

async fn health_check() -> axum::Json<response::ApiResponse<serde_json::Value>> {
    response::ok(
        "ok",
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}
