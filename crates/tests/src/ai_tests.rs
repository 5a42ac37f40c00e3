use crate::fixtures::{seed::data, test_app::TestApp};

#[tokio::test]
async fn icebreakers_fall_back_without_api_key() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("ice").await;

    for (user, interests) in [(&pair.first, ["hiking", "chess"]), (&pair.second, ["Hiking", "yoga"])] {
        app.auth_put("/api/users/me", &user.access_token)
            .json(&serde_json::json!({ "interests": interests }))
            .send()
            .await
            .unwrap();
    }

    let resp = app
        .auth_post("/api/ai/icebreakers", &pair.first.access_token)
        .json(&serde_json::json!({ "match_id": pair.match_id, "count": 2 }))
        .send()
        .await
        .unwrap();
    let result = data(resp).await;
    assert_eq!(result["source"], "fallback");
    let suggestions = result["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 2);
    assert!(suggestions[0].as_str().unwrap().contains("hiking"));
}

#[tokio::test]
async fn icebreakers_require_match_membership() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("ice").await;
    let outsider = app.register_user("outsider@test.com", "Outsider").await;

    let resp = app
        .auth_post("/api/ai/icebreakers", &outsider.access_token)
        .json(&serde_json::json!({ "match_id": pair.match_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn conversation_starters_use_given_interests() {
    let app = TestApp::spawn().await;
    let user = app.register_user("starter@test.com", "Starter").await;

    let resp = app
        .auth_post("/api/ai/conversation-starters", &user.access_token)
        .json(&serde_json::json!({ "interests": ["Surfing"], "count": 4 }))
        .send()
        .await
        .unwrap();
    let suggestions = data(resp).await["suggestions"].as_array().unwrap().clone();
    assert_eq!(suggestions.len(), 4);
    assert!(suggestions[0].as_str().unwrap().contains("surfing"));

    // With no body the caller's own (empty) interests give generic openers.
    let resp = app
        .auth_post("/api/ai/conversation-starters", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["suggestions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn bio_analysis_suggests_improvements() {
    let app = TestApp::spawn().await;
    let user = app.register_user("bio@test.com", "Bio").await;

    let resp = app
        .auth_post("/api/ai/analyze-bio", &user.access_token)
        .json(&serde_json::json!({ "bio": "I love climbing and coffee." }))
        .send()
        .await
        .unwrap();
    let analysis = data(resp).await;
    assert_eq!(analysis["word_count"], 5);
    assert_eq!(analysis["detected_interests"], serde_json::json!(["climbing", "coffee"]));
    assert_eq!(analysis["has_question"], false);
    // Short and no question.
    assert_eq!(analysis["suggestions"].as_array().unwrap().len(), 2);
}
