use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use bson::oid::ObjectId;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use kindred_realtime::protocol::{
    DeliveredPayload, Frame, RoomPayload, SendMessagePayload, events,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{chat, dispatcher::send_to_connection, storage::WsSender};
use crate::{error::ApiError, routes::parse_id, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Verify JWT before accepting the WebSocket
    let token = params
        .token
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    let user_id = state.auth.authenticate(&token)?;

    if let Some(claimed) = params.user_id.as_deref() {
        if claimed != user_id.to_hex() {
            return Err(ApiError::Forbidden("user_id does not match token".to_string()));
        }
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: ObjectId) {
    let connection_id = Uuid::new_v4().to_string();
    info!(?user_id, %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let first = state
        .ws_storage
        .add(user_id, connection_id.clone(), sender.clone());

    let hello = Frame::new(
        events::CONNECTED,
        json!({ "user_id": user_id.to_hex(), "connection_id": connection_id }),
    );
    send_to_connection(&state.ws_storage, &connection_id, &hello).await;

    if first {
        chat::announce_presence(&state, user_id, true).await;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, user_id, &connection_id, text.as_str()).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(?user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.rooms.leave_all(&connection_id);
    if state.ws_storage.remove(&user_id, &connection_id) {
        chat::announce_presence(&state, user_id, false).await;
    }

    info!(?user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    user_id: ObjectId,
    connection_id: &str,
    text: &str,
) {
    let Some(frame) = Frame::parse(text) else {
        debug!(?user_id, %connection_id, "Ignoring malformed WS frame");
        return;
    };

    debug!(?user_id, %connection_id, event = %frame.event, "WS message received");

    let result = handle_event(state, user_id, connection_id, &frame).await;

    let reply = match (frame.ack, result) {
        (Some(ack), result) => Frame::ack_reply(ack, ack_body(result)),
        (None, Ok(_)) => return,
        (None, Err(e)) => {
            debug!(?user_id, event = %frame.event, %e, "WS event rejected");
            Frame::new(
                events::ERROR,
                json!({ "event": frame.event, "error": error_text(&e) }),
            )
        }
    };
    send_to_connection(&state.ws_storage, connection_id, &reply).await;
}

async fn handle_event(
    state: &AppState,
    user_id: ObjectId,
    connection_id: &str,
    frame: &Frame,
) -> Result<Value, ApiError> {
    match frame.event.as_str() {
        events::HEARTBEAT => {
            state.users.touch_activity(user_id).await?;
            Ok(json!({ "timestamp": Utc::now() }))
        }
        events::JOIN_ROOM => {
            let room: RoomPayload = payload(frame)?;
            let match_id = parse_id(&room.match_id, "match_id")?;
            state.matches.find_for_member(match_id, user_id).await?;
            let joined = state.rooms.join(match_id, connection_id);
            Ok(json!({ "match_id": room.match_id, "joined": joined }))
        }
        events::LEAVE_ROOM => {
            let room: RoomPayload = payload(frame)?;
            let match_id = parse_id(&room.match_id, "match_id")?;
            let left = state.rooms.leave(match_id, connection_id);
            Ok(json!({ "match_id": room.match_id, "left": left }))
        }
        events::TYPING | events::STOP_TYPING => {
            let room: RoomPayload = payload(frame)?;
            let match_id = parse_id(&room.match_id, "match_id")?;
            chat::relay_typing(state, user_id, match_id, &frame.event).await?;
            Ok(json!({}))
        }
        events::SEND_MESSAGE => {
            let send: SendMessagePayload = payload(frame)?;
            let match_id = parse_id(&send.match_id, "match_id")?;
            let message =
                chat::send_message(state, user_id, match_id, &send.content, send.client_id)
                    .await?;
            Ok(json!({ "message": message }))
        }
        events::MARK_READ => {
            let room: RoomPayload = payload(frame)?;
            let match_id = parse_id(&room.match_id, "match_id")?;
            let receipt = chat::mark_read(state, user_id, match_id).await?;
            Ok(json!({ "count": receipt.count, "read_at": receipt.read_at }))
        }
        events::MESSAGE_DELIVERED => {
            let delivered: DeliveredPayload = payload(frame)?;
            let match_id = parse_id(&delivered.match_id, "match_id")?;
            let message_id = parse_id(&delivered.message_id, "message_id")?;
            let receipt = chat::mark_delivered(state, user_id, match_id, message_id).await?;
            Ok(json!({ "delivered_at": receipt.delivered_at }))
        }
        other => Err(ApiError::BadRequest(format!("Unknown event: {other}"))),
    }
}

fn payload<T: DeserializeOwned>(frame: &Frame) -> Result<T, ApiError> {
    serde_json::from_value(frame.data.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid {} payload: {e}", frame.event)))
}

fn error_text(err: &ApiError) -> String {
    err.public_detail()
        .unwrap_or_else(|| "Internal server error".to_string())
}

/// `{ "success": true, ..fields }` on success, `{ "success": false, "error" }` otherwise.
fn ack_body(result: Result<Value, ApiError>) -> Value {
    match result {
        Ok(Value::Object(mut fields)) => {
            fields.insert("success".to_string(), Value::Bool(true));
            Value::Object(fields)
        }
        Ok(_) => json!({ "success": true }),
        Err(e) => json!({ "success": false, "error": error_text(&e) }),
    }
}
