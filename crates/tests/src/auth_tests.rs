use crate::fixtures::{
    seed::{PASSWORD, data},
    test_app::TestApp,
};
use chrono::{Datelike, Utc};
use serde_json::Value;

#[tokio::test]
async fn register_creates_user_and_returns_tokens() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "Alice@Test.com",
            "password": PASSWORD,
            "display_name": "Alice",
            "birth_date": "1994-02-01",
            "gender": "woman",
            "interested_in": ["man"],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    assert!(resp.headers().get("set-cookie").is_some());

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert!(json["data"]["access_token"].is_string());
    assert!(json["data"]["refresh_token"].is_string());
    assert_eq!(json["data"]["user"]["email"], "alice@test.com");
    assert_eq!(json["data"]["user"]["display_name"], "Alice");
    assert!(json["data"]["user"]["age"].as_u64().unwrap() >= 30);
}

#[tokio::test]
async fn register_rejects_minors() {
    let app = TestApp::spawn().await;

    let today = Utc::now().date_naive();
    let seventeen = today
        .with_year(today.year() - 17)
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string();

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "young@test.com",
            "password": PASSWORD,
            "display_name": "Young",
            "birth_date": seventeen,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn register_duplicate_email_fails() {
    let app = TestApp::spawn().await;
    app.register_user("dup@test.com", "First").await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "DUP@test.com",
            "password": PASSWORD,
            "display_name": "Second",
            "birth_date": "1990-01-01",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "short@test.com",
            "password": "abc",
            "display_name": "Short",
            "birth_date": "1990-01-01",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn login_with_valid_credentials() {
    let app = TestApp::spawn().await;
    app.register_user("login@test.com", "Login").await;

    let resp = app.login("LOGIN@test.com", PASSWORD).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json = data(resp).await;
    assert!(json["access_token"].is_string());
    assert_eq!(json["user"]["email"], "login@test.com");
}

#[tokio::test]
async fn login_with_wrong_password_fails() {
    let app = TestApp::spawn().await;
    app.register_user("wrong@test.com", "Wrong").await;

    let resp = app.login("wrong@test.com", "WrongPassword!").await;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.login("nobody@test.com", PASSWORD).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn me_requires_token() {
    let app = TestApp::spawn().await;
    let user = app.register_user("me@test.com", "Me").await;

    let resp = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.auth_get("/api/auth/me", "not-a-token").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.auth_get("/api/auth/me", &user.access_token).send().await.unwrap();
    let json = data(resp).await;
    assert_eq!(json["id"], user.id.as_str());
}

#[tokio::test]
async fn cookie_authenticates_requests() {
    let app = TestApp::spawn().await;
    let user = app.register_user("cookie@test.com", "Cookie").await;

    let resp = app
        .client
        .get(app.url("/api/users/me"))
        .header("Cookie", format!("theme=dark; access_token={}", user.access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn refresh_issues_new_tokens() {
    let app = TestApp::spawn().await;
    let user = app.register_user("refresh@test.com", "Refresh").await;

    let resp = app
        .client
        .post(app.url("/api/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    let json = data(resp).await;
    assert!(json["access_token"].is_string());

    // An access token is not a refresh token.
    let resp = app
        .client
        .post(app.url("/api/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": user.access_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn health_check_uses_envelope() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    let json = data(resp).await;
    assert_eq!(json["status"], "ok");
}
