use crate::fixtures::{seed::SeededUser, test_app::TestApp};
use kindred_realtime::{
    ChatError, ChatSession, ClientConfig, ConnectionState, RealtimeClient, WsConnector,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

async fn connected_client(app: &TestApp, user: &SeededUser) -> RealtimeClient {
    let config = ClientConfig::from_settings(
        format!("ws://{}/ws", app.addr),
        user.access_token.clone(),
        &app.settings.realtime,
    );
    let client = RealtimeClient::new(config, Arc::new(WsConnector));
    client.connect(&user.id).unwrap();
    assert!(client.wait_for(ConnectionState::Connected, WAIT).await);
    client
}

/// Polls `check` until it holds or the wait runs out.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test]
async fn client_connects_and_heartbeats_are_acknowledged() {
    let app = TestApp::spawn().await;
    let user = app.register_user("client@test.com", "Client").await;

    let client = connected_client(&app, &user).await;
    assert!(client.is_connected());
    assert_eq!(client.user_id().as_deref(), Some(user.id.as_str()));
    assert_eq!(client.heartbeat_starts(), 1);

    let ack = client
        .emit_with_ack("heartbeat", serde_json::json!({}), WAIT)
        .await;
    assert!(ack.success);
    assert!(ack.data["timestamp"].is_string());

    client.disconnect();
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn mismatched_user_id_never_connects() {
    let app = TestApp::spawn().await;
    let user = app.register_user("client@test.com", "Client").await;
    let other = app.register_user("other@test.com", "Other").await;

    let config = ClientConfig {
        reconnection_attempts: 0,
        ..ClientConfig::new(format!("ws://{}/ws", app.addr), user.access_token.clone())
    };
    let client = RealtimeClient::new(config, Arc::new(WsConnector));
    client.connect(&other.id).unwrap();

    assert!(client.wait_for(ConnectionState::Error, WAIT).await);
    assert!(!client.is_connected());
    assert!(client.last_error().is_some());
}

#[tokio::test]
async fn chat_sessions_exchange_messages() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("session").await;

    let alice = ChatSession::new(connected_client(&app, &pair.first).await, pair.first.id.clone());
    let bob = ChatSession::new(connected_client(&app, &pair.second).await, pair.second.id.clone());

    alice.join(&pair.match_id).unwrap();
    bob.join(&pair.match_id).unwrap();
    assert_eq!(alice.active_room().as_deref(), Some(pair.match_id.as_str()));

    let sent = alice.send_message("  Coffee this weekend?  ").await.unwrap();
    assert_eq!(sent.content, "Coffee this weekend?");
    assert_eq!(sent.sender_id, pair.first.id);
    assert_eq!(sent.match_id, pair.match_id);

    assert!(eventually(|| bob.messages().iter().any(|m| m.id == sent.id)).await);
    // Bob's session confirms delivery, which flows back to Alice.
    assert!(
        eventually(|| {
            alice
                .messages()
                .iter()
                .any(|m| m.id == sent.id && m.delivered_at.is_some())
        })
        .await
    );
    assert_eq!(alice.messages().len(), 1);

    bob.mark_read().unwrap();
    assert!(
        eventually(|| alice.messages().iter().all(|m| m.read_at.is_some())).await
    );
}

#[tokio::test]
async fn typing_indicator_reaches_partner_session() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("typing").await;

    let alice = ChatSession::new(connected_client(&app, &pair.first).await, pair.first.id.clone());
    let bob = ChatSession::new(connected_client(&app, &pair.second).await, pair.second.id.clone());
    alice.join(&pair.match_id).unwrap();
    bob.join(&pair.match_id).unwrap();

    assert!(alice.start_typing());
    assert!(alice.is_typing());
    assert!(eventually(|| bob.typing_users() == vec![pair.first.id.clone()]).await);

    alice.stop_typing();
    assert!(!alice.is_typing());
    assert!(eventually(|| bob.typing_users().is_empty()).await);
}

#[tokio::test]
async fn sending_requires_an_active_room() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("noroom").await;

    let alice = ChatSession::new(connected_client(&app, &pair.first).await, pair.first.id.clone());
    assert!(matches!(alice.send_message("hi").await, Err(ChatError::NoActiveRoom)));

    alice.join(&pair.match_id).unwrap();
    assert!(matches!(alice.send_message("   ").await, Err(ChatError::EmptyMessage)));
}

#[tokio::test]
async fn outsider_messages_are_rejected_by_the_server() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("reject").await;
    let outsider = app.register_user("outsider@test.com", "Outsider").await;

    let session = ChatSession::new(connected_client(&app, &outsider).await, outsider.id.clone());
    session.join(&pair.match_id).unwrap();
    let result = session.send_message("let me in").await;
    assert!(matches!(result, Err(ChatError::Rejected(_))));
    assert!(session.messages().is_empty());
}
