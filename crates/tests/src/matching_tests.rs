use crate::fixtures::{seed::data, test_app::TestApp};
use kindred_db::models::MessageType;

#[tokio::test]
async fn match_requires_reciprocal_like() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;
    let bob = app.register_user("bob@test.com", "Bob").await;

    let swipe = app.swipe(&alice, &bob, "like").await;
    assert_eq!(swipe["matched"], false);
    assert!(swipe.get("match").is_none());

    // A pass back does not match.
    let swipe = app.swipe(&bob, &alice, "pass").await;
    assert_eq!(swipe["matched"], false);

    let resp = app.auth_get("/api/matches", &alice.access_token).send().await.unwrap();
    assert_eq!(data(resp).await, serde_json::json!([]));

    // Changing the pass into a like does.
    let swipe = app.swipe(&bob, &alice, "like").await;
    assert_eq!(swipe["matched"], true);
    assert_eq!(swipe["match"]["partner"]["id"], alice.id.as_str());
}

#[tokio::test]
async fn match_is_created_only_once() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("once").await;

    // Swiping again on either side creates nothing new.
    let swipe = app.swipe(&pair.first, &pair.second, "super_like").await;
    assert_eq!(swipe["matched"], false);
    let swipe = app.swipe(&pair.second, &pair.first, "like").await;
    assert_eq!(swipe["matched"], false);

    let resp = app
        .auth_get("/api/matches", &pair.first.access_token)
        .send()
        .await
        .unwrap();
    let matches = data(resp).await;
    assert_eq!(matches.as_array().unwrap().len(), 1);
    assert_eq!(matches[0]["id"], pair.match_id.as_str());
    assert_eq!(matches[0]["partner"]["display_name"], "once B");
}

#[tokio::test]
async fn cannot_swipe_on_self_or_unknown_user() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice@test.com", "Alice").await;

    let resp = app
        .auth_post("/api/matches/swipe", &alice.access_token)
        .json(&serde_json::json!({ "target_id": alice.id, "action": "like" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_post("/api/matches/swipe", &alice.access_token)
        .json(&serde_json::json!({ "target_id": bson::oid::ObjectId::new().to_hex(), "action": "like" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn match_notifies_both_users() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("notify").await;

    for user in [&pair.first, &pair.second] {
        let resp = app
            .auth_get("/api/notifications", &user.access_token)
            .send()
            .await
            .unwrap();
        let page = data(resp).await;
        let matches = page["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["notification_type"] == "match")
            .count();
        assert_eq!(matches, 1);
    }
}

#[tokio::test]
async fn messages_are_paginated_newest_first() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("msgs").await;
    let match_id = bson::oid::ObjectId::parse_str(&pair.match_id).unwrap();
    let first = bson::oid::ObjectId::parse_str(&pair.first.id).unwrap();

    for i in 0..5 {
        app.state
            .messages
            .create(match_id, first, format!("hello {i}"), MessageType::Text, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages?page=1&per_page=2", pair.match_id),
            &pair.second.access_token,
        )
        .send()
        .await
        .unwrap();
    let page = data(resp).await;
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["items"][0]["content"], "hello 4");

    let resp = app
        .auth_get("/api/matches", &pair.second.access_token)
        .send()
        .await
        .unwrap();
    let matches = data(resp).await;
    assert_eq!(matches[0]["unread_count"], 5);
    assert_eq!(matches[0]["last_message"]["content"], "hello 4");
}

#[tokio::test]
async fn mark_read_clears_unread_count() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("read").await;
    let match_id = bson::oid::ObjectId::parse_str(&pair.match_id).unwrap();
    let first = bson::oid::ObjectId::parse_str(&pair.first.id).unwrap();

    for i in 0..3 {
        app.state
            .messages
            .create(match_id, first, format!("ping {i}"), MessageType::Text, None)
            .await
            .unwrap();
    }

    let resp = app
        .auth_post(&format!("/api/matches/{}/read", pair.match_id), &pair.second.access_token)
        .send()
        .await
        .unwrap();
    let receipt = data(resp).await;
    assert_eq!(receipt["count"], 3);
    assert_eq!(receipt["reader_id"], pair.second.id.as_str());

    let resp = app
        .auth_get("/api/matches", &pair.second.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await[0]["unread_count"], 0);
}

#[tokio::test]
async fn outsiders_cannot_read_messages() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("private").await;
    let outsider = app.register_user("outsider@test.com", "Outsider").await;

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", pair.match_id),
            &outsider.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn unmatch_hides_the_match() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("unmatch").await;

    let resp = app
        .auth_delete(&format!("/api/matches/{}", pair.match_id), &pair.first.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    for user in [&pair.first, &pair.second] {
        let resp = app.auth_get("/api/matches", &user.access_token).send().await.unwrap();
        assert_eq!(data(resp).await, serde_json::json!([]));
    }

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", pair.match_id),
            &pair.second.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
