use crate::fixtures::{
    seed::{SeededUser, data},
    test_app::TestApp,
};
use chrono::{Duration, Utc};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn quiet_window_around_now() -> (String, String) {
    let now = Utc::now();
    (
        (now - Duration::hours(1)).format("%H:%M").to_string(),
        (now + Duration::hours(1)).format("%H:%M").to_string(),
    )
}

async fn notifications(app: &TestApp, token: &str) -> Vec<Value> {
    let resp = app.auth_get("/api/notifications", token).send().await.unwrap();
    data(resp).await["items"].as_array().unwrap().clone()
}

/// Puts `user` inside a quiet window that covers now.
async fn enable_quiet_hours(app: &TestApp, user: &SeededUser, push: bool) {
    let (start, end) = quiet_window_around_now();
    let resp = app
        .auth_put("/api/notifications/preferences", &user.access_token)
        .json(&serde_json::json!({
            "push": push,
            "quiet_hours": {
                "enabled": true,
                "start": start,
                "end": end,
                "utc_offset_minutes": 0,
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(data(resp).await["push"], push);
}

/// Moves every deferral into the past so the release job picks it up.
async fn expire_deferrals(app: &TestApp) {
    let past = bson::DateTime::from_chrono(Utc::now() - Duration::minutes(1));
    let updated = app
        .db
        .collection::<bson::Document>("notifications")
        .update_many(
            bson::doc! { "deferred_until": { "$ne": null } },
            bson::doc! { "$set": { "deferred_until": past } },
        )
        .await
        .unwrap();
    assert_eq!(updated.modified_count, 1);
}

/// Waits up to `wait` for a frame of type `event`, skipping other traffic.
async fn next_frame(ws: &mut Socket, event: &str, wait: std::time::Duration) -> Option<Value> {
    let read = async {
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            if frame["type"] == event {
                return Some(frame);
            }
        }
        None
    };
    tokio::time::timeout(wait, read).await.ok().flatten()
}

/// Opens a socket for `user` once the hub has registered it.
async fn open_socket(app: &TestApp, user: &SeededUser) -> Socket {
    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url(&user.access_token))
        .await
        .expect("WS connect failed");
    next_frame(&mut ws, "connected", std::time::Duration::from_secs(5))
        .await
        .expect("connected frame");
    ws
}

#[tokio::test]
async fn like_notifies_target() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    app.swipe(&alice, &bob, "like").await;

    let items = notifications(&app, &bob.access_token).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["notification_type"], "like");
    assert_eq!(items[0]["is_read"], false);

    let resp = app
        .auth_get("/api/notifications/unread-count", &bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["count"], 1);
}

#[tokio::test]
async fn mark_read_and_delete() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;
    let carol = app.register_user("carol@test.com", "Carol").await;

    app.swipe(&alice, &bob, "like").await;
    app.swipe(&carol, &bob, "super_like").await;

    let items = notifications(&app, &bob.access_token).await;
    assert_eq!(items.len(), 2);
    let first_id = items[0]["id"].as_str().unwrap().to_string();

    let resp = app
        .auth_put(&format!("/api/notifications/{first_id}/read"), &bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Someone else's notification is out of reach.
    let resp = app
        .auth_put(&format!("/api/notifications/{first_id}/read"), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_get("/api/notifications?unread_only=true", &bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["total"], 1);

    let resp = app
        .auth_put("/api/notifications/read-all", &bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["updated"], 1);

    let resp = app
        .auth_delete(&format!("/api/notifications/{first_id}"), &bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(notifications(&app, &bob.access_token).await.len(), 1);
}

#[tokio::test]
async fn disabled_types_are_not_stored() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    let resp = app
        .auth_put("/api/notifications/preferences", &bob.access_token)
        .json(&serde_json::json!({ "likes": false }))
        .send()
        .await
        .unwrap();
    let prefs = data(resp).await;
    assert_eq!(prefs["likes"], false);
    assert_eq!(prefs["new_matches"], true);

    app.swipe(&alice, &bob, "like").await;
    assert!(notifications(&app, &bob.access_token).await.is_empty());

    let count = app
        .db
        .collection::<bson::Document>("notifications")
        .count_documents(bson::doc! {})
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn quiet_hours_defer_notifications() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    let (start, end) = quiet_window_around_now();
    let resp = app
        .auth_put("/api/notifications/preferences", &bob.access_token)
        .json(&serde_json::json!({
            "quiet_hours": {
                "enabled": true,
                "start": start,
                "end": end,
                "utc_offset_minutes": 0,
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get("/api/notifications/quiet-hours/status", &bob.access_token)
        .send()
        .await
        .unwrap();
    let status = data(resp).await;
    assert_eq!(status["enabled"], true);
    assert_eq!(status["active"], true);
    assert!(status["ends_at"].is_string());

    app.swipe(&alice, &bob, "like").await;

    // Stored, but hidden until the window closes.
    assert!(notifications(&app, &bob.access_token).await.is_empty());
    let stored = app
        .db
        .collection::<bson::Document>("notifications")
        .find_one(bson::doc! {})
        .await
        .unwrap()
        .expect("deferred notification stored");
    assert!(stored.get_datetime("deferred_until").is_ok());
}

#[tokio::test]
async fn quiet_hours_status_inactive_by_default() {
    let app = TestApp::spawn().await;
    let user = app.register_user("quiet@test.com", "Quiet").await;

    let resp = app
        .auth_get("/api/notifications/quiet-hours/status", &user.access_token)
        .send()
        .await
        .unwrap();
    let status = data(resp).await;
    assert_eq!(status["enabled"], false);
    assert_eq!(status["active"], false);
    assert_eq!(status["start"], "22:00");
    assert_eq!(status["end"], "08:00");
}

#[tokio::test]
async fn malformed_quiet_hours_are_rejected() {
    let app = TestApp::spawn().await;
    let user = app.register_user("bad@test.com", "Bad").await;

    let resp = app
        .auth_put("/api/notifications/preferences", &user.access_token)
        .json(&serde_json::json!({
            "quiet_hours": { "enabled": true, "start": "25:00", "end": "07:00" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn released_notifications_are_listed_and_pushed() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    enable_quiet_hours(&app, &bob, true).await;
    app.swipe(&alice, &bob, "like").await;
    assert!(notifications(&app, &bob.access_token).await.is_empty());

    let mut ws = open_socket(&app, &bob).await;

    // Nothing is due while the window is still open.
    assert_eq!(app.state.notifier.release_due().await.unwrap(), 0);

    expire_deferrals(&app).await;
    assert_eq!(app.state.notifier.release_due().await.unwrap(), 1);

    let items = notifications(&app, &bob.access_token).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["notification_type"], "like");

    let frame = next_frame(&mut ws, "notification", std::time::Duration::from_secs(5))
        .await
        .expect("released notification pushed over the socket");
    assert_eq!(frame["data"]["notification_type"], "like");
    assert_eq!(frame["data"]["id"], items[0]["id"]);

    // A second pass finds nothing left to release.
    assert_eq!(app.state.notifier.release_due().await.unwrap(), 0);
    ws.close(None).await.ok();
}

#[tokio::test]
async fn released_notifications_respect_push_opt_out() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    enable_quiet_hours(&app, &bob, false).await;
    app.swipe(&alice, &bob, "like").await;

    let mut ws = open_socket(&app, &bob).await;

    expire_deferrals(&app).await;
    assert_eq!(app.state.notifier.release_due().await.unwrap(), 1);

    // Visible in the listing, but never pushed live.
    assert_eq!(notifications(&app, &bob.access_token).await.len(), 1);
    assert!(
        next_frame(&mut ws, "notification", std::time::Duration::from_millis(500))
            .await
            .is_none()
    );
    ws.close(None).await.ok();
}
