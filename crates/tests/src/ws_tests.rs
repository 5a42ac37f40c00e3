use crate::fixtures::{seed::SeededUser, test_app::TestApp};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects and consumes the `connected` frame.
async fn connect(app: &TestApp, user: &SeededUser) -> (Socket, Value) {
    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url(&user.access_token))
        .await
        .expect("WS connect failed");
    let hello = next_event(&mut ws, "connected").await;
    (ws, hello)
}

/// Reads frames until one of type `event` arrives, skipping the rest.
async fn next_event(ws: &mut Socket, event: &str) -> Value {
    let wait = async {
        loop {
            let msg = ws.next().await.expect("socket closed").expect("socket error");
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            if frame["type"] == event {
                return frame;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("Timeout waiting for {event}"))
}

async fn emit(ws: &mut Socket, event: &str, data: Value, ack: Option<u64>) {
    let mut frame = json!({ "type": event, "data": data });
    if let Some(ack) = ack {
        frame["ack"] = json!(ack);
    }
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn upgrade_requires_token() {
    let app = TestApp::spawn().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws", app.addr)).await;
    assert!(result.is_err());

    let result = tokio_tungstenite::connect_async(app.ws_url("not-a-jwt")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn connected_frame_identifies_the_connection() {
    let app = TestApp::spawn().await;
    let user = app.register_user("ws@test.com", "Ws").await;

    let (mut ws, hello) = connect(&app, &user).await;
    assert_eq!(hello["data"]["user_id"], user.id.as_str());
    assert!(hello["data"]["connection_id"].is_string());

    emit(&mut ws, "heartbeat", json!({}), Some(1)).await;
    let ack = next_event(&mut ws, "ack").await;
    assert_eq!(ack["ack"], 1);
    assert_eq!(ack["data"]["success"], true);

    ws.close(None).await.ok();
}

#[tokio::test]
async fn join_room_checks_membership() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("room").await;
    let outsider = app.register_user("outsider@test.com", "Outsider").await;

    let (mut ws, _) = connect(&app, &pair.first).await;
    emit(&mut ws, "join_room", json!({ "match_id": pair.match_id }), Some(7)).await;
    let ack = next_event(&mut ws, "ack").await;
    assert_eq!(ack["ack"], 7);
    assert_eq!(ack["data"]["success"], true);
    assert_eq!(ack["data"]["joined"], true);

    let (mut ws_out, _) = connect(&app, &outsider).await;
    emit(&mut ws_out, "join_room", json!({ "match_id": pair.match_id }), Some(1)).await;
    let ack = next_event(&mut ws_out, "ack").await;
    assert_eq!(ack["data"]["success"], false);
    assert!(ack["data"]["error"].is_string());

    // Without an ack id the rejection arrives as an error frame.
    emit(&mut ws_out, "join_room", json!({ "match_id": pair.match_id }), None).await;
    let err = next_event(&mut ws_out, "error").await;
    assert_eq!(err["data"]["event"], "join_room");

    ws.close(None).await.ok();
    ws_out.close(None).await.ok();
}

#[tokio::test]
async fn sent_message_reaches_partner_and_is_stored() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("chat").await;

    let (mut ws_a, _) = connect(&app, &pair.first).await;
    let (mut ws_b, _) = connect(&app, &pair.second).await;

    emit(
        &mut ws_a,
        "send_message",
        json!({ "match_id": pair.match_id, "content": "  Hi there!  ", "client_id": "c-1" }),
        Some(2),
    )
    .await;
    let ack = next_event(&mut ws_a, "ack").await;
    assert_eq!(ack["data"]["success"], true);
    assert_eq!(ack["data"]["message"]["content"], "Hi there!");
    assert_eq!(ack["data"]["message"]["client_id"], "c-1");

    let incoming = next_event(&mut ws_b, "new_message").await;
    assert_eq!(incoming["data"]["sender_id"], pair.first.id.as_str());
    assert_eq!(incoming["data"]["id"], ack["data"]["message"]["id"]);

    let notification = next_event(&mut ws_b, "notification").await;
    assert_eq!(notification["data"]["notification_type"], "message");

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", pair.match_id),
            &pair.second.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["total"], 1);

    ws_a.close(None).await.ok();
    ws_b.close(None).await.ok();
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("empty").await;

    let (mut ws, _) = connect(&app, &pair.first).await;
    emit(
        &mut ws,
        "send_message",
        json!({ "match_id": pair.match_id, "content": "   " }),
        Some(3),
    )
    .await;
    let ack = next_event(&mut ws, "ack").await;
    assert_eq!(ack["data"]["success"], false);

    ws.close(None).await.ok();
}

#[tokio::test]
async fn typing_is_relayed_to_partner() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("typing").await;

    let (mut ws_a, _) = connect(&app, &pair.first).await;
    let (mut ws_b, _) = connect(&app, &pair.second).await;

    emit(&mut ws_a, "typing", json!({ "match_id": pair.match_id }), None).await;
    let typing = next_event(&mut ws_b, "typing").await;
    assert_eq!(typing["data"]["user_id"], pair.first.id.as_str());
    assert_eq!(typing["data"]["match_id"], pair.match_id.as_str());

    emit(&mut ws_a, "stop_typing", json!({ "match_id": pair.match_id }), None).await;
    let stopped = next_event(&mut ws_b, "stop_typing").await;
    assert_eq!(stopped["data"]["user_id"], pair.first.id.as_str());

    ws_a.close(None).await.ok();
    ws_b.close(None).await.ok();
}

#[tokio::test]
async fn presence_is_announced_to_matches() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("presence").await;

    let (mut ws_a, _) = connect(&app, &pair.first).await;
    let (ws_b, _) = connect(&app, &pair.second).await;

    let online = next_event(&mut ws_a, "user_online").await;
    assert_eq!(online["data"]["user_id"], pair.second.id.as_str());

    let resp = app
        .auth_get(
            &format!("/api/users/{}/activity", pair.second.id),
            &pair.first.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["status"], "online");

    drop(ws_b);
    let offline = next_event(&mut ws_a, "user_offline").await;
    assert_eq!(offline["data"]["user_id"], pair.second.id.as_str());

    ws_a.close(None).await.ok();
}

#[tokio::test]
async fn mark_read_sends_receipts_both_ways() {
    let app = TestApp::spawn().await;
    let pair = app.seed_match("receipt").await;

    let (mut ws_a, _) = connect(&app, &pair.first).await;
    let (mut ws_b, _) = connect(&app, &pair.second).await;

    emit(
        &mut ws_a,
        "send_message",
        json!({ "match_id": pair.match_id, "content": "Read me" }),
        Some(1),
    )
    .await;
    next_event(&mut ws_a, "ack").await;
    next_event(&mut ws_b, "new_message").await;

    emit(&mut ws_b, "mark_read", json!({ "match_id": pair.match_id }), Some(2)).await;
    let ack = next_event(&mut ws_b, "ack").await;
    assert_eq!(ack["data"]["count"], 1);

    let read = next_event(&mut ws_a, "message_read").await;
    assert_eq!(read["data"]["reader_id"], pair.second.id.as_str());
    assert_eq!(read["data"]["count"], 1);

    ws_a.close(None).await.ok();
    ws_b.close(None).await.ok();
}
