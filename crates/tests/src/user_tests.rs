use crate::fixtures::{seed::data, test_app::TestApp};
use serde_json::Value;

#[tokio::test]
async fn update_profile_normalizes_interests() {
    let app = TestApp::spawn().await;
    let user = app.register_user("profile@test.com", "Profile").await;

    let resp = app
        .auth_put("/api/users/me", &user.access_token)
        .json(&serde_json::json!({
            "bio": "Trail runner and amateur baker.",
            "interests": ["Hiking", " hiking ", "Coffee"],
        }))
        .send()
        .await
        .unwrap();
    let json = data(resp).await;
    assert_eq!(json["bio"], "Trail runner and amateur baker.");
    assert_eq!(json["interests"], serde_json::json!(["hiking", "coffee"]));

    // Served from the cache afterwards, which must reflect the update.
    let resp = app.auth_get("/api/users/me", &user.access_token).send().await.unwrap();
    let json = data(resp).await;
    assert_eq!(json["interests"], serde_json::json!(["hiking", "coffee"]));
}

#[tokio::test]
async fn update_profile_rejects_long_bio() {
    let app = TestApp::spawn().await;
    let user = app.register_user("bio@test.com", "Bio").await;

    let resp = app
        .auth_put("/api/users/me", &user.access_token)
        .json(&serde_json::json!({ "bio": "x".repeat(501) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn location_rejects_out_of_range_coordinates() {
    let app = TestApp::spawn().await;
    let user = app.register_user("loc@test.com", "Loc").await;

    let resp = app
        .auth_put("/api/users/me/location", &user.access_token)
        .json(&serde_json::json!({ "lng": 200.0, "lat": 10.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn nearby_finds_users_within_radius() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;
    let carol = app.register_user("carol@test.com", "Carol").await;

    // Vienna, a few km apart, and Paris.
    app.set_location(&alice, 16.3738, 48.2082).await;
    app.set_location(&bob, 16.3900, 48.2200).await;
    app.set_location(&carol, 2.3522, 48.8566).await;

    let resp = app
        .auth_get("/api/users/nearby?max_km=50", &alice.access_token)
        .send()
        .await
        .unwrap();
    let json = data(resp).await;
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![bob.id.as_str()]);
    // Other users' exact location and email stay private.
    assert!(json[0].get("email").is_none());
    assert!(json[0].get("location").is_none());
}

#[tokio::test]
async fn nearby_without_location_is_rejected() {
    let app = TestApp::spawn().await;
    let user = app.register_user("noloc@test.com", "NoLoc").await;

    let resp = app
        .auth_get("/api/users/nearby", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn profile_views_are_deduplicated_within_a_day() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("owner@test.com", "Owner").await;
    let viewer = app.register_user("viewer@test.com", "Viewer").await;

    for _ in 0..3 {
        let resp = app
            .auth_get(&format!("/api/users/{}", owner.id), &viewer.access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let resp = app
        .auth_get("/api/users/me/viewers", &owner.access_token)
        .send()
        .await
        .unwrap();
    let viewers = data(resp).await;
    assert_eq!(viewers.as_array().unwrap().len(), 1);
    assert_eq!(viewers[0]["viewer_id"], viewer.id.as_str());
    assert_eq!(viewers[0]["display_name"], "Viewer");

    let resp = app
        .auth_get("/api/notifications", &owner.access_token)
        .send()
        .await
        .unwrap();
    let page = data(resp).await;
    let views: Vec<&Value> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["notification_type"] == "profile_view")
        .collect();
    assert_eq!(views.len(), 1);
}

#[tokio::test]
async fn viewing_own_profile_is_not_recorded() {
    let app = TestApp::spawn().await;
    let user = app.register_user("self@test.com", "Self").await;

    let resp = app
        .auth_get(&format!("/api/users/{}", user.id), &user.access_token)
        .send()
        .await
        .unwrap();
    let json = data(resp).await;
    assert_eq!(json["email"], "self@test.com");

    let resp = app
        .auth_get("/api/users/me/viewers", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await, serde_json::json!([]));
}

#[tokio::test]
async fn activity_reports_inactive_for_new_users() {
    let app = TestApp::spawn().await;
    let user = app.register_user("act@test.com", "Act").await;
    let other = app.register_user("other@test.com", "Other").await;

    let resp = app
        .auth_get(&format!("/api/users/{}/activity", user.id), &other.access_token)
        .send()
        .await
        .unwrap();
    let json = data(resp).await;
    assert!(json["status"].is_string());
    assert_ne!(json["status"], "online");
}

#[tokio::test]
async fn invalid_ids_are_bad_requests() {
    let app = TestApp::spawn().await;
    let user = app.register_user("ids@test.com", "Ids").await;

    let resp = app
        .auth_get("/api/users/not-an-id", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
