use crate::fixtures::{seed::data, test_app::TestApp};

#[tokio::test]
async fn feedback_is_recorded_and_validated() {
    let app = TestApp::spawn().await;
    let user = app.register_user("tester@test.com", "Tester").await;

    let resp = app
        .auth_post("/api/beta/feedback", &user.access_token)
        .json(&serde_json::json!({
            "category": "  Matching ",
            "rating": 4,
            "message": "Suggestions feel relevant",
            "screen": "discover",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let feedback = data(resp).await;
    assert_eq!(feedback["category"], "matching");
    assert_eq!(feedback["rating"], 4);

    let resp = app
        .auth_post("/api/beta/feedback", &user.access_token)
        .json(&serde_json::json!({ "category": "ui", "rating": 6, "message": "Too good" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn bug_reports_move_through_statuses() {
    let app = TestApp::spawn().await;
    let user = app.register_user("bugs@test.com", "Bugs").await;

    let resp = app
        .auth_post("/api/beta/bugs", &user.access_token)
        .json(&serde_json::json!({
            "title": "Chat does not scroll",
            "description": "New messages land below the fold",
            "severity": "high",
            "steps_to_reproduce": ["Open a chat", "Receive 20 messages"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let bug = data(resp).await;
    assert_eq!(bug["status"], "open");
    assert_eq!(bug["severity"], "high");
    assert_eq!(bug["reporter_id"], user.id.as_str());

    let resp = app
        .auth_put(
            &format!("/api/beta/bugs/{}/status", bug["id"].as_str().unwrap()),
            &user.access_token,
        )
        .json(&serde_json::json!({ "status": "fixed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["status"], "fixed");
}

#[tokio::test]
async fn sessions_end_once_and_only_by_owner() {
    let app = TestApp::spawn().await;
    let user = app.register_user("session@test.com", "Session").await;
    let other = app.register_user("other@test.com", "Other").await;

    let resp = app
        .auth_post("/api/beta/sessions", &user.access_token)
        .json(&serde_json::json!({ "device": "Pixel 8", "app_version": "0.9.1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let session = data(resp).await;
    assert!(session["ended_at"].is_null());
    let path = format!("/api/beta/sessions/{}/end", session["id"].as_str().unwrap());

    let resp = app.auth_put(&path, &other.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_put(&path, &user.access_token)
        .json(&serde_json::json!({ "screens_visited": ["discover", "chat"] }))
        .send()
        .await
        .unwrap();
    let ended = data(resp).await;
    assert!(ended["ended_at"].is_string());
    assert!(ended["duration_secs"].as_i64().unwrap() >= 0);
    assert_eq!(ended["screens_visited"], serde_json::json!(["discover", "chat"]));

    let resp = app.auth_put(&path, &user.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn stats_aggregate_everything() {
    let app = TestApp::spawn().await;
    let user = app.register_user("stats@test.com", "Stats").await;

    for rating in [2, 4] {
        app.auth_post("/api/beta/feedback", &user.access_token)
            .json(&serde_json::json!({ "category": "chat", "rating": rating, "message": "ok" }))
            .send()
            .await
            .unwrap();
    }
    app.auth_post("/api/beta/bugs", &user.access_token)
        .json(&serde_json::json!({ "title": "Crash", "description": "On launch" }))
        .send()
        .await
        .unwrap();
    let resp = app
        .auth_post("/api/beta/sessions", &user.access_token)
        .send()
        .await
        .unwrap();
    let session = data(resp).await;
    app.auth_put(
        &format!("/api/beta/sessions/{}/end", session["id"].as_str().unwrap()),
        &user.access_token,
    )
    .send()
    .await
    .unwrap();
    app.auth_post("/api/beta/sessions", &user.access_token)
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_get("/api/beta/stats", &user.access_token)
        .send()
        .await
        .unwrap();
    let stats = data(resp).await;
    assert_eq!(stats["feedback_by_category"][0]["category"], "chat");
    assert_eq!(stats["feedback_by_category"][0]["count"], 2);
    assert_eq!(stats["feedback_by_category"][0]["average_rating"], 3.0);
    assert_eq!(stats["bugs_by_severity"][0]["key"], "medium");
    assert_eq!(stats["bugs_by_status"][0]["key"], "open");
    assert_eq!(stats["sessions"]["total"], 2);
    assert_eq!(stats["sessions"]["completed"], 1);
}
