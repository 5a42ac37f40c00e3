use axum::extract::ws::Message;
use bson::oid::ObjectId;
use futures::SinkExt;
use kindred_realtime::Frame;
use tracing::{debug, warn};

use super::storage::{WsSender, WsStorage};

async fn deliver(sender: &WsSender, text: &str) -> bool {
    let mut guard = sender.lock().await;
    guard.send(Message::text(text.to_owned())).await.is_ok()
}

/// Sends a frame to all connections of the specified users.
pub async fn broadcast(ws_storage: &WsStorage, user_ids: &[ObjectId], frame: &Frame) {
    let text = frame.to_text();

    for user_id in user_ids {
        for sender in ws_storage.get_senders(user_id) {
            if deliver(&sender, &text).await {
                debug!(?user_id, event = %frame.event, "WS frame sent");
            } else {
                warn!(?user_id, event = %frame.event, "Failed to send WS frame");
            }
        }
    }
}

/// Sends a frame to a specific user's connections.
pub async fn send_to_user(ws_storage: &WsStorage, user_id: &ObjectId, frame: &Frame) {
    broadcast(ws_storage, &[*user_id], frame).await;
}

/// Sends a frame to one connection only.
pub async fn send_to_connection(ws_storage: &WsStorage, connection_id: &str, frame: &Frame) {
    let Some(sender) = ws_storage.get_connection(connection_id) else {
        debug!(%connection_id, "WS connection gone");
        return;
    };
    if !deliver(&sender, &frame.to_text()).await {
        warn!(%connection_id, event = %frame.event, "Failed to send WS frame");
    }
}

/// Builds a frame from any serializable payload.
pub fn frame<T: serde::Serialize>(event: &str, data: &T) -> Frame {
    Frame::new(event, serde_json::to_value(data).unwrap_or_default())
}
